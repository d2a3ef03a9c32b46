//! Seed data shared by service and router tests.

use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::test_config;
use crate::models::{EventDetail, NewEvent, NewSeller, NewTicketType, NewVenue, ProfileUpdate, Seller};
use crate::payments::FakeGateway;
use crate::state::AppState;
use crate::store::{MarketplaceStore, MemoryStore};

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub payments: Arc<FakeGateway>,
    pub state: AppState,
}

pub fn test_app() -> TestApp {
    test_app_with(FakeGateway::new())
}

pub fn test_app_with(gateway: FakeGateway) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let payments = Arc::new(gateway);
    let state = AppState::new(store.clone(), payments.clone(), test_config());
    TestApp {
        store,
        payments,
        state,
    }
}

pub fn ticket_type(name: &str, price: i64, quantity: i32) -> NewTicketType {
    NewTicketType {
        name: name.to_string(),
        description: None,
        price: Decimal::from(price),
        quantity,
        max_per_order: None,
        benefits: Vec::new(),
    }
}

pub fn new_event(title: &str, category: &str, city: &str, ticket_types: Vec<NewTicketType>) -> NewEvent {
    NewEvent {
        title: title.to_string(),
        description: None,
        category: category.to_string(),
        date: (Utc::now() + Duration::days(14)).date_naive(),
        start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
        end_time: None,
        tags: Vec::new(),
        cover_image: None,
        is_featured: false,
        is_hot: false,
        venue_id: None,
        venue: Some(NewVenue {
            name: format!("{city} Arena"),
            address: "1 Main Street".to_string(),
            city: city.to_string(),
        }),
        ticket_types,
    }
}

pub async fn seller(store: &MemoryStore) -> (Uuid, Seller) {
    let user_id = Uuid::new_v4();
    let seller = store
        .create_seller(
            user_id,
            &NewSeller {
                business_name: "Lagos Live".to_string(),
                business_email: None,
            },
        )
        .await
        .unwrap();
    (user_id, seller)
}

pub async fn event(store: &MemoryStore, seller: &Seller, event: NewEvent) -> EventDetail {
    store.create_event(seller.id, &event).await.unwrap()
}

/// A buyer with a profile complete enough to check out.
pub async fn buyer(store: &MemoryStore) -> Uuid {
    let user_id = Uuid::new_v4();
    store
        .upsert_profile(
            user_id,
            &ProfileUpdate {
                full_name: Some("Ada Obi".to_string()),
                email: Some("ada@example.com".to_string()),
                phone: None,
            },
        )
        .await
        .unwrap();
    user_id
}
