use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub promo_code_id: Option<Uuid>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One unit-ticket line of an order draft: `quantity` tickets of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftLine {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
}

/// Priced order for a single event, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub event_id: Uuid,
    pub lines: Vec<DraftLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl OrderDraft {
    pub fn ticket_count(&self) -> i32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Everything one checkout writes, applied in a single transaction.
#[derive(Debug, Clone)]
pub struct CheckoutDraft {
    pub user_id: Uuid,
    pub orders: Vec<OrderDraft>,
    pub promo_code_id: Option<Uuid>,
}
