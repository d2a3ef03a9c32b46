use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoCode {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub min_purchase: Option<Decimal>,
    pub event_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPromoCode {
    pub code: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_uses: Option<i32>,
    pub min_purchase: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub event_id: Option<Uuid>,
}

/// A validated code with the discount it yields for a given subtotal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedPromo {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub event_id: Option<Uuid>,
    pub amount: Decimal,
}
