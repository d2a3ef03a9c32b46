use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub sold: i32,
    pub max_per_order: Option<i32>,
    pub benefits: Vec<String>,
}

/// Opaque token printed as the ticket's QR code.
pub fn generate_qr_code() -> String {
    format!(
        "TIXHUB-{}-{}",
        Utc::now().timestamp_millis(),
        crate::utils::random_code(9)
    )
}

impl TicketType {
    pub fn remaining(&self) -> i32 {
        (self.quantity - self.sold).max(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicketType {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub max_per_order: Option<i32>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Valid,
    Used,
    Transferred,
    Refunded,
    Expired,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Valid => "valid",
            TicketStatus::Used => "used",
            TicketStatus::Transferred => "transferred",
            TicketStatus::Refunded => "refunded",
            TicketStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub user_id: Uuid,
    pub qr_code: String,
    pub status: TicketStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Ticket as listed on the holder's "my tickets" page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketView {
    pub id: Uuid,
    pub qr_code: String,
    pub status: TicketStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub ticket_type_name: String,
    pub price: Decimal,
    pub event_id: Uuid,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub venue_name: Option<String>,
}

/// Ticket with the context a door scanner needs.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketLookup {
    pub id: Uuid,
    pub qr_code: String,
    pub status: TicketStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub ticket_type_name: String,
    pub event_id: Uuid,
    pub event_title: String,
    pub event_date: NaiveDate,
    pub seller_id: Uuid,
    pub holder_name: Option<String>,
    pub holder_email: Option<String>,
}
