use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::{NewTicketType, TicketType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    Active,
    Hidden,
    VipOnly,
    SoldOut,
    Expired,
    Cancelled,
}

impl EventStatus {
    /// Statuses shown in public listings.
    pub const LISTED: [EventStatus; 2] = [EventStatus::Active, EventStatus::SoldOut];

    pub fn is_listed(self) -> bool {
        Self::LISTED.contains(&self)
    }
}

/// Event row joined with its venue's name and city.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub is_featured: bool,
    pub is_hot: bool,
    pub total_tickets: i32,
    pub sold_tickets: i32,
    pub status: EventStatus,
    pub venue_name: Option<String>,
    pub venue_city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub ticket_types: Vec<TicketType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub category: Option<String>,
    pub city: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVenue {
    pub name: String,
    pub address: String,
    pub city: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_hot: bool,
    pub venue_id: Option<Uuid>,
    pub venue: Option<NewVenue>,
    pub ticket_types: Vec<NewTicketType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: i16,
    pub comment: Option<String>,
}
