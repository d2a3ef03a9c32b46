//! Payment gateway boundary.
//!
//! Checkout hands a [`PaymentRequest`] to a [`PaymentGateway`] and redirects the
//! buyer to the returned checkout URL. When the buyer comes back through the
//! callback, the payment reference is verified with the gateway before any
//! order is marked paid.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::AppError;

pub mod fake;
pub mod monnify;

pub use fake::FakeGateway;
pub use monnify::MonnifyGateway;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway authentication failed: {0}")]
    Auth(String),

    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected payment gateway response: {0}")]
    Malformed(String),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        AppError::ExternalServiceError(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub payment_reference: String,
    pub amount: Decimal,
    pub customer_name: String,
    pub customer_email: String,
    pub description: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub checkout_url: String,
    pub payment_reference: String,
    pub transaction_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Overpaid,
    PartiallyPaid,
    Pending,
    Abandoned,
    Cancelled,
    Failed,
    Reversed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether the buyer paid at least the requested amount.
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Overpaid)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentVerification {
    pub status: PaymentStatus,
    pub amount_paid: Option<Decimal>,
    pub message: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    fn provider(&self) -> &'static str;

    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentSession, PaymentError>;

    async fn verify(&self, payment_reference: &str) -> Result<PaymentVerification, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_gateway_values() {
        let status: PaymentStatus = serde_json::from_str("\"PARTIALLY_PAID\"").unwrap();
        assert_eq!(status, PaymentStatus::PartiallyPaid);
        let status: PaymentStatus = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(status, PaymentStatus::Unknown);
    }

    #[test]
    fn test_only_paid_and_overpaid_settle() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Overpaid.is_settled());
        assert!(!PaymentStatus::PartiallyPaid.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
    }
}
