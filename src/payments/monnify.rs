use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    PaymentError, PaymentGateway, PaymentRequest, PaymentSession, PaymentStatus,
    PaymentVerification,
};
use crate::config::MonnifyConfig;

const CURRENCY: &str = "NGN";
const PAYMENT_METHODS: [&str; 3] = ["CARD", "ACCOUNT_TRANSFER", "USSD"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Tokens are refreshed this long before the gateway says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    request_successful: bool,
    response_message: Option<String>,
    response_body: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitBody {
    checkout_url: String,
    transaction_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    payment_status: PaymentStatus,
    amount_paid: Option<Decimal>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Monnify hosted-checkout client.
pub struct MonnifyGateway {
    config: MonnifyConfig,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl MonnifyGateway {
    pub fn new(config: MonnifyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: MonnifyConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(self.url("/api/v1/auth/login"))
            .basic_auth(&self.config.api_key, Some(&self.config.secret_key))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Auth(format!("status={status} body={text}")));
        }

        let login: LoginBody = unwrap_envelope(response.json().await?).map_err(|e| match e {
            PaymentError::Rejected(msg) => PaymentError::Auth(msg),
            other => other,
        })?;
        debug!(expires_in = login.expires_in, "Monnify access token refreshed");

        let lifetime = Duration::from_secs(login.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: login.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(login.access_token)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(envelope: Envelope<T>) -> Result<T, PaymentError> {
    let message = envelope
        .response_message
        .unwrap_or_else(|| "no message".to_string());
    if !envelope.request_successful {
        return Err(PaymentError::Rejected(message));
    }
    envelope
        .response_body
        .ok_or_else(|| PaymentError::Malformed(format!("missing responseBody ({message})")))
}

#[async_trait]
impl PaymentGateway for MonnifyGateway {
    fn provider(&self) -> &'static str {
        "monnify"
    }

    #[instrument(skip(self, request), fields(reference = %request.payment_reference, amount = %request.amount))]
    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        let token = self.access_token().await?;
        let amount = request
            .amount
            .to_f64()
            .ok_or_else(|| PaymentError::Malformed(format!("amount {} out of range", request.amount)))?;

        let response = self
            .client
            .post(self.url("/api/v1/merchant/transactions/init-transaction"))
            .bearer_auth(token)
            .json(&json!({
                "amount": amount,
                "customerName": request.customer_name,
                "customerEmail": request.customer_email,
                "paymentReference": request.payment_reference,
                "paymentDescription": request.description,
                "currencyCode": CURRENCY,
                "contractCode": self.config.contract_code,
                "redirectUrl": request.redirect_url,
                "paymentMethods": PAYMENT_METHODS,
            }))
            .send()
            .await?;

        let envelope: Envelope<InitBody> = response.json().await?;
        info!(
            successful = envelope.request_successful,
            message = envelope.response_message.as_deref().unwrap_or(""),
            "Monnify init response"
        );
        let body = unwrap_envelope(envelope)?;

        Ok(PaymentSession {
            checkout_url: body.checkout_url,
            payment_reference: request.payment_reference.clone(),
            transaction_reference: body.transaction_reference,
        })
    }

    #[instrument(skip(self))]
    async fn verify(&self, payment_reference: &str) -> Result<PaymentVerification, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(self.url("/api/v1/merchant/transactions/query"))
            .query(&[("paymentReference", payment_reference)])
            .bearer_auth(token)
            .send()
            .await?;

        let envelope: Envelope<QueryBody> = response.json().await?;
        let message = envelope.response_message.clone();
        info!(
            successful = envelope.request_successful,
            message = message.as_deref().unwrap_or(""),
            "Monnify verify response"
        );

        match unwrap_envelope(envelope) {
            Ok(body) => Ok(PaymentVerification {
                status: body.payment_status,
                amount_paid: body.amount_paid,
                message,
            }),
            // The gateway answers "not found" for references the buyer never paid.
            Err(PaymentError::Rejected(msg)) => {
                warn!(message = %msg, "Monnify could not resolve payment reference");
                Ok(PaymentVerification {
                    status: PaymentStatus::Pending,
                    amount_paid: None,
                    message: Some(msg),
                })
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_failure_is_rejected() {
        let envelope: Envelope<LoginBody> = serde_json::from_value(json!({
            "requestSuccessful": false,
            "responseMessage": "Invalid credentials",
            "responseCode": "99"
        }))
        .unwrap();
        match unwrap_envelope(envelope) {
            Err(PaymentError::Rejected(msg)) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_query_body_parses_amount_and_status() {
        let envelope: Envelope<QueryBody> = serde_json::from_value(json!({
            "requestSuccessful": true,
            "responseMessage": "success",
            "responseBody": { "paymentStatus": "PAID", "amountPaid": 8400.0 }
        }))
        .unwrap();
        let body = unwrap_envelope(envelope).unwrap();
        assert_eq!(body.payment_status, PaymentStatus::Paid);
        assert_eq!(body.amount_paid, Some(Decimal::from(8400)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let gateway = MonnifyGateway::new(MonnifyConfig {
            base_url: "https://sandbox.monnify.com/".to_string(),
            api_key: "k".to_string(),
            secret_key: "s".to_string(),
            contract_code: "c".to_string(),
        });
        assert_eq!(
            gateway.url("/api/v1/auth/login"),
            "https://sandbox.monnify.com/api/v1/auth/login"
        );
    }
}
