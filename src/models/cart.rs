use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Cart line joined with the ticket type and event it refers to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub ticket_type_name: String,
    pub price: Decimal,
    pub max_per_order: Option<i32>,
    pub event_id: Uuid,
    pub event_title: String,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total_items: i32,
    pub total_price: Decimal,
}

impl Cart {
    pub fn new(items: Vec<CartItem>) -> Self {
        let total_items = items.iter().map(|i| i.quantity).sum();
        let total_price = items.iter().map(CartItem::line_total).sum();
        Self {
            items,
            total_items,
            total_price,
        }
    }
}
