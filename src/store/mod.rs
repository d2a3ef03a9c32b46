//! Persistence boundary for the marketplace.
//!
//! [`MarketplaceStore`] is implemented by [`PgStore`] in production and by
//! [`MemoryStore`] in tests. Both apply a [`CheckoutDraft`] atomically: the
//! promo redemption and every sold-counter increment are conditional, so a
//! checkout that would oversell a ticket type or exceed a promo's usage cap
//! fails as a whole with [`AppError::Conflict`](crate::utils::AppError).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    CartItem, CheckoutDraft, Event, EventDetail, EventFilter, NewEvent, NewPromoCode, NewReview,
    NewSeller, Order, Profile, ProfileUpdate, PromoCode, Review, Seller, Ticket, TicketLookup,
    TicketType, TicketView, UserPreferences,
};
use crate::utils::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlag {
    Featured,
    Hot,
}

#[async_trait]
pub trait MarketplaceStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Listed events (active or sold out) matching category and city, soonest first.
    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<Event>>;
    async fn flagged_events(&self, flag: EventFlag, limit: i64) -> AppResult<Vec<Event>>;
    async fn get_event(&self, id: Uuid) -> AppResult<Option<Event>>;
    async fn ticket_types_for_event(&self, event_id: Uuid) -> AppResult<Vec<TicketType>>;
    async fn get_ticket_type(&self, id: Uuid) -> AppResult<Option<TicketType>>;
    async fn create_event(&self, seller_id: Uuid, event: &NewEvent) -> AppResult<EventDetail>;
    /// Listed events on or after `from`, soonest first.
    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> AppResult<Vec<Event>>;
    /// Listed events ordered by tickets sold, most first.
    async fn popular_events(&self, limit: i64) -> AppResult<Vec<Event>>;
    async fn events_for_seller(&self, seller_id: Uuid) -> AppResult<Vec<Event>>;

    async fn cart_items(&self, user_id: Uuid) -> AppResult<Vec<CartItem>>;
    /// Adds `quantity` to the user's line for this ticket type, creating it if needed.
    async fn add_to_cart(&self, user_id: Uuid, ticket_type_id: Uuid, quantity: i32)
        -> AppResult<()>;
    async fn set_cart_quantity(&self, user_id: Uuid, item_id: Uuid, quantity: i32)
        -> AppResult<bool>;
    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<bool>;
    async fn clear_cart(&self, user_id: Uuid) -> AppResult<()>;

    /// Active codes whose text equals `code` (already normalised).
    async fn active_promo_codes(&self, code: &str) -> AppResult<Vec<PromoCode>>;
    async fn create_promo_code(
        &self,
        seller_id: Uuid,
        code: &str,
        promo: &NewPromoCode,
    ) -> AppResult<PromoCode>;
    async fn promo_codes_for_seller(&self, seller_id: Uuid) -> AppResult<Vec<PromoCode>>;
    async fn delete_promo_code(&self, seller_id: Uuid, id: Uuid) -> AppResult<bool>;

    async fn place_orders(&self, draft: &CheckoutDraft) -> AppResult<Vec<Order>>;
    async fn set_payment_reference(&self, order_ids: &[Uuid], reference: &str) -> AppResult<()>;
    async fn orders_by_reference(&self, reference: &str) -> AppResult<Vec<Order>>;
    /// Moves pending orders to completed and their pending tickets to valid.
    /// Returns how many orders changed state.
    async fn complete_orders(&self, order_ids: &[Uuid]) -> AppResult<u64>;
    async fn completed_orders_for_events(&self, event_ids: &[Uuid]) -> AppResult<Vec<Order>>;
    async fn purchased_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<TicketView>>;
    async fn find_ticket_by_qr(&self, qr_code: &str) -> AppResult<Option<TicketLookup>>;
    /// Marks a valid ticket used. `None` when the ticket is not currently valid.
    async fn check_in_ticket(&self, ticket_id: Uuid, at: DateTime<Utc>)
        -> AppResult<Option<Ticket>>;

    async fn seller_for_user(&self, user_id: Uuid) -> AppResult<Option<Seller>>;
    async fn create_seller(&self, user_id: Uuid, seller: &NewSeller) -> AppResult<Seller>;
    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>>;
    async fn upsert_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> AppResult<Profile>;
    async fn preferences(&self, user_id: Uuid) -> AppResult<Option<UserPreferences>>;
    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        prefs: &UserPreferences,
    ) -> AppResult<UserPreferences>;

    /// Returns whether the event is a favorite after the toggle.
    async fn toggle_favorite(&self, user_id: Uuid, event_id: Uuid) -> AppResult<bool>;
    async fn favorite_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;
    async fn reviews_for_event(&self, event_id: Uuid) -> AppResult<Vec<Review>>;
    async fn add_review(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        review: &NewReview,
    ) -> AppResult<Review>;
}
