use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{
    PaymentError, PaymentGateway, PaymentRequest, PaymentSession, PaymentStatus,
    PaymentVerification,
};

/// In-process gateway: records initialized payments and reports whatever
/// status a test marks them with.
#[derive(Default)]
pub struct FakeGateway {
    pub initialized: Mutex<Vec<PaymentRequest>>,
    statuses: Mutex<HashMap<String, (PaymentStatus, Option<Decimal>)>>,
    pub fail_initialize: bool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_initialize: true,
            ..Self::default()
        }
    }

    pub async fn mark(&self, payment_reference: &str, status: PaymentStatus, amount: Option<Decimal>) {
        self.statuses
            .lock()
            .await
            .insert(payment_reference.to_string(), (status, amount));
    }

    pub async fn last_request(&self) -> Option<PaymentRequest> {
        self.initialized.lock().await.last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider(&self) -> &'static str {
        "fake"
    }

    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError> {
        if self.fail_initialize {
            return Err(PaymentError::Rejected("sandbox unavailable".to_string()));
        }
        self.initialized.lock().await.push(request.clone());
        Ok(PaymentSession {
            checkout_url: format!("https://pay.test/checkout/{}", request.payment_reference),
            payment_reference: request.payment_reference.clone(),
            transaction_reference: Some(format!("MNFY|{}", request.payment_reference)),
        })
    }

    async fn verify(&self, payment_reference: &str) -> Result<PaymentVerification, PaymentError> {
        let (status, amount_paid) = self
            .statuses
            .lock()
            .await
            .get(payment_reference)
            .copied()
            .unwrap_or((PaymentStatus::Pending, None));
        Ok(PaymentVerification {
            status,
            amount_paid,
            message: None,
        })
    }
}
