use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{EventFlag, MarketplaceStore};
use crate::models::ticket::generate_qr_code;
use crate::models::{
    CartItem, CheckoutDraft, Event, EventDetail, EventFilter, EventStatus, NewEvent, NewPromoCode,
    NewReview, NewSeller, Order, OrderDraft, OrderStatus, Profile, ProfileUpdate, PromoCode,
    Review, Seller, Ticket, TicketLookup, TicketStatus, TicketType, TicketView, UserPreferences,
    Venue,
};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    ticket_type_id: Uuid,
    quantity: i32,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    venues: HashMap<Uuid, Venue>,
    sellers: Vec<Seller>,
    profiles: HashMap<Uuid, Profile>,
    preferences: HashMap<Uuid, UserPreferences>,
    events: Vec<Event>,
    ticket_types: Vec<TicketType>,
    cart: Vec<CartRow>,
    promos: Vec<PromoCode>,
    orders: Vec<Order>,
    tickets: Vec<Ticket>,
    favorites: Vec<(Uuid, Uuid, DateTime<Utc>)>,
    reviews: Vec<Review>,
}

impl MemoryState {
    fn event(&self, id: Uuid) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    fn ticket_type(&self, id: Uuid) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| t.id == id)
    }

    fn listed(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.status.is_listed())
    }

    fn redeem_promo(&mut self, promo_id: Uuid) -> AppResult<()> {
        let promo = self
            .promos
            .iter_mut()
            .find(|p| p.id == promo_id && p.is_active)
            .filter(|p| p.max_uses.map_or(true, |max| p.used_count < max))
            .ok_or_else(|| {
                AppError::Conflict("This promo code has reached its usage limit".to_string())
            })?;
        promo.used_count += 1;
        Ok(())
    }

    fn insert_order(
        &mut self,
        user_id: Uuid,
        promo_code_id: Option<Uuid>,
        draft: &OrderDraft,
    ) -> AppResult<Order> {
        let count = draft.ticket_count();
        let event = self
            .events
            .iter_mut()
            .find(|e| e.id == draft.event_id)
            .filter(|e| e.status == EventStatus::Active && e.sold_tickets + count <= e.total_tickets)
            .ok_or_else(|| {
                AppError::Conflict(format!(
                    "Event {} is no longer available for purchase",
                    draft.event_id
                ))
            })?;
        event.sold_tickets += count;
        event.updated_at = Utc::now();

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            event_id: draft.event_id,
            status: OrderStatus::Pending,
            subtotal: draft.subtotal,
            discount_amount: draft.discount,
            total_amount: draft.total,
            promo_code_id,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        };

        for line in &draft.lines {
            let ticket_type = self
                .ticket_types
                .iter_mut()
                .find(|t| t.id == line.ticket_type_id && t.event_id == draft.event_id)
                .filter(|t| t.sold + line.quantity <= t.quantity)
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "Not enough tickets left for ticket type {}",
                        line.ticket_type_id
                    ))
                })?;
            ticket_type.sold += line.quantity;

            for _ in 0..line.quantity {
                self.tickets.push(Ticket {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    ticket_type_id: line.ticket_type_id,
                    user_id,
                    qr_code: generate_qr_code(),
                    status: TicketStatus::Pending,
                    checked_in_at: None,
                    created_at: now,
                });
            }
        }

        self.orders.push(order.clone());
        Ok(order)
    }
}

/// In-process store with the same atomicity guarantees as [`super::PgStore`]:
/// multi-step writes run against a copy of the state that replaces the
/// live state only when every step succeeded.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `apply` to the stored event, for seeding flags and counters.
    pub async fn update_event(&self, id: Uuid, apply: impl FnOnce(&mut Event)) -> bool {
        let mut state = self.state.lock().await;
        match state.events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                apply(event);
                true
            }
            None => false,
        }
    }

    pub async fn tickets_for_order(&self, order_id: Uuid) -> Vec<Ticket> {
        let state = self.state.lock().await;
        state
            .tickets
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect()
    }

    pub async fn promo_code(&self, id: Uuid) -> Option<PromoCode> {
        let state = self.state.lock().await;
        state.promos.iter().find(|p| p.id == id).cloned()
    }
}

fn sort_by_schedule(events: &mut [Event]) {
    events.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .listed()
            .filter(|e| filter.category.as_ref().map_or(true, |c| &e.category == c))
            .filter(|e| {
                filter.city.as_ref().map_or(true, |city| {
                    e.venue_city
                        .as_ref()
                        .is_some_and(|v| v.eq_ignore_ascii_case(city))
                })
            })
            .cloned()
            .collect();
        sort_by_schedule(&mut events);
        Ok(events)
    }

    async fn flagged_events(&self, flag: EventFlag, limit: i64) -> AppResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .listed()
            .filter(|e| match flag {
                EventFlag::Featured => e.is_featured,
                EventFlag::Hot => e.is_hot,
            })
            .cloned()
            .collect();
        sort_by_schedule(&mut events);
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn get_event(&self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(self.state.lock().await.event(id).cloned())
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> AppResult<Vec<TicketType>> {
        let state = self.state.lock().await;
        let mut types: Vec<TicketType> = state
            .ticket_types
            .iter()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(types)
    }

    async fn get_ticket_type(&self, id: Uuid) -> AppResult<Option<TicketType>> {
        Ok(self.state.lock().await.ticket_type(id).cloned())
    }

    async fn create_event(&self, seller_id: Uuid, event: &NewEvent) -> AppResult<EventDetail> {
        let mut state = self.state.lock().await;

        let venue = match (&event.venue, event.venue_id) {
            (Some(new_venue), _) => {
                let venue = Venue {
                    id: Uuid::new_v4(),
                    name: new_venue.name.clone(),
                    address: new_venue.address.clone(),
                    city: new_venue.city.clone(),
                };
                state.venues.insert(venue.id, venue.clone());
                Some(venue)
            }
            (None, Some(id)) => Some(
                state
                    .venues
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("Venue {id} not found")))?,
            ),
            (None, None) => None,
        };

        let now = Utc::now();
        let created = Event {
            id: Uuid::new_v4(),
            seller_id,
            venue_id: venue.as_ref().map(|v| v.id),
            title: event.title.clone(),
            description: event.description.clone(),
            category: event.category.clone(),
            date: event.date,
            start_time: event.start_time,
            end_time: event.end_time,
            tags: event.tags.clone(),
            cover_image: event.cover_image.clone(),
            is_featured: event.is_featured,
            is_hot: event.is_hot,
            total_tickets: event.ticket_types.iter().map(|t| t.quantity).sum(),
            sold_tickets: 0,
            status: EventStatus::Active,
            venue_name: venue.as_ref().map(|v| v.name.clone()),
            venue_city: venue.as_ref().map(|v| v.city.clone()),
            created_at: now,
            updated_at: now,
        };

        let ticket_types: Vec<TicketType> = event
            .ticket_types
            .iter()
            .map(|t| TicketType {
                id: Uuid::new_v4(),
                event_id: created.id,
                name: t.name.clone(),
                description: t.description.clone(),
                price: t.price,
                quantity: t.quantity,
                sold: 0,
                max_per_order: t.max_per_order,
                benefits: t.benefits.clone(),
            })
            .collect();

        state.events.push(created.clone());
        state.ticket_types.extend(ticket_types.iter().cloned());

        Ok(EventDetail {
            event: created,
            ticket_types,
        })
    }

    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> AppResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state.listed().filter(|e| e.date >= from).cloned().collect();
        sort_by_schedule(&mut events);
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn popular_events(&self, limit: i64) -> AppResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state.listed().cloned().collect();
        events.sort_by(|a, b| b.sold_tickets.cmp(&a.sold_tickets));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }

    async fn events_for_seller(&self, seller_id: Uuid) -> AppResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| e.seller_id == seller_id)
            .cloned()
            .collect();
        sort_by_schedule(&mut events);
        Ok(events)
    }

    async fn cart_items(&self, user_id: Uuid) -> AppResult<Vec<CartItem>> {
        let state = self.state.lock().await;
        Ok(state
            .cart
            .iter()
            .filter(|row| row.user_id == user_id)
            .filter_map(|row| {
                let ticket_type = state.ticket_type(row.ticket_type_id)?;
                let event = state.event(ticket_type.event_id)?;
                Some(CartItem {
                    id: row.id,
                    ticket_type_id: row.ticket_type_id,
                    quantity: row.quantity,
                    ticket_type_name: ticket_type.name.clone(),
                    price: ticket_type.price,
                    max_per_order: ticket_type.max_per_order,
                    event_id: event.id,
                    event_title: event.title.clone(),
                })
            })
            .collect())
    }

    async fn add_to_cart(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        match state
            .cart
            .iter_mut()
            .find(|row| row.user_id == user_id && row.ticket_type_id == ticket_type_id)
        {
            Some(row) => {
                row.quantity = row.quantity.checked_add(quantity).ok_or_else(|| {
                    AppError::ValidationError("Cart quantity is too large".to_string())
                })?;
            }
            None => state.cart.push(CartRow {
                id: Uuid::new_v4(),
                user_id,
                ticket_type_id,
                quantity,
            }),
        }
        Ok(())
    }

    async fn set_cart_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .cart
            .iter_mut()
            .find(|row| row.id == item_id && row.user_id == user_id)
        {
            Some(row) => {
                row.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.cart.len();
        state
            .cart
            .retain(|row| !(row.id == item_id && row.user_id == user_id));
        Ok(state.cart.len() < before)
    }

    async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
        self.state
            .lock()
            .await
            .cart
            .retain(|row| row.user_id != user_id);
        Ok(())
    }

    async fn active_promo_codes(&self, code: &str) -> AppResult<Vec<PromoCode>> {
        let state = self.state.lock().await;
        Ok(state
            .promos
            .iter()
            .filter(|p| p.is_active && p.code == code)
            .cloned()
            .collect())
    }

    async fn create_promo_code(
        &self,
        seller_id: Uuid,
        code: &str,
        promo: &NewPromoCode,
    ) -> AppResult<PromoCode> {
        let mut state = self.state.lock().await;
        if state
            .promos
            .iter()
            .any(|p| p.code == code && p.event_id == promo.event_id)
        {
            return Err(AppError::Conflict(
                "A promo code with this text already exists".to_string(),
            ));
        }
        let created = PromoCode {
            id: Uuid::new_v4(),
            seller_id,
            code: code.to_string(),
            discount_type: promo.discount_type,
            discount_value: promo.discount_value,
            max_uses: promo.max_uses,
            used_count: 0,
            expires_at: promo.expires_at,
            min_purchase: promo.min_purchase,
            event_id: promo.event_id,
            is_active: true,
            created_at: Utc::now(),
        };
        state.promos.push(created.clone());
        Ok(created)
    }

    async fn promo_codes_for_seller(&self, seller_id: Uuid) -> AppResult<Vec<PromoCode>> {
        let state = self.state.lock().await;
        let mut codes: Vec<PromoCode> = state
            .promos
            .iter()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect();
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(codes)
    }

    async fn delete_promo_code(&self, seller_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.promos.len();
        state
            .promos
            .retain(|p| !(p.id == id && p.seller_id == seller_id));
        Ok(state.promos.len() < before)
    }

    async fn place_orders(&self, draft: &CheckoutDraft) -> AppResult<Vec<Order>> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();

        if let Some(promo_id) = draft.promo_code_id {
            next.redeem_promo(promo_id)?;
        }
        let mut orders = Vec::with_capacity(draft.orders.len());
        for order in &draft.orders {
            orders.push(next.insert_order(draft.user_id, draft.promo_code_id, order)?);
        }

        *state = next;
        Ok(orders)
    }

    async fn set_payment_reference(&self, order_ids: &[Uuid], reference: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        for order in state.orders.iter_mut().filter(|o| order_ids.contains(&o.id)) {
            order.payment_reference = Some(reference.to_string());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn orders_by_reference(&self, reference: &str) -> AppResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned()
            .collect())
    }

    async fn complete_orders(&self, order_ids: &[Uuid]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let mut completed = HashSet::new();
        for order in state.orders.iter_mut() {
            if order_ids.contains(&order.id) && order.status == OrderStatus::Pending {
                order.status = OrderStatus::Completed;
                order.updated_at = Utc::now();
                completed.insert(order.id);
            }
        }
        for ticket in state.tickets.iter_mut() {
            if completed.contains(&ticket.order_id) && ticket.status == TicketStatus::Pending {
                ticket.status = TicketStatus::Valid;
            }
        }
        Ok(completed.len() as u64)
    }

    async fn completed_orders_for_events(&self, event_ids: &[Uuid]) -> AppResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Completed && event_ids.contains(&o.event_id))
            .cloned()
            .collect())
    }

    async fn purchased_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let mut ids: Vec<Uuid> = state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id && o.status == OrderStatus::Completed)
            .map(|o| o.event_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<TicketView>> {
        let state = self.state.lock().await;
        let mut views: Vec<TicketView> = state
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id && t.status != TicketStatus::Pending)
            .filter_map(|t| {
                let ticket_type = state.ticket_type(t.ticket_type_id)?;
                let event = state.event(ticket_type.event_id)?;
                Some(TicketView {
                    id: t.id,
                    qr_code: t.qr_code.clone(),
                    status: t.status,
                    checked_in_at: t.checked_in_at,
                    ticket_type_name: ticket_type.name.clone(),
                    price: ticket_type.price,
                    event_id: event.id,
                    event_title: event.title.clone(),
                    event_date: event.date,
                    venue_name: event.venue_name.clone(),
                })
            })
            .collect();
        views.sort_by_key(|v| v.event_date);
        Ok(views)
    }

    async fn find_ticket_by_qr(&self, qr_code: &str) -> AppResult<Option<TicketLookup>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .iter()
            .find(|t| t.qr_code == qr_code)
            .and_then(|t| {
                let ticket_type = state.ticket_type(t.ticket_type_id)?;
                let event = state.event(ticket_type.event_id)?;
                let holder = state.profiles.get(&t.user_id);
                Some(TicketLookup {
                    id: t.id,
                    qr_code: t.qr_code.clone(),
                    status: t.status,
                    checked_in_at: t.checked_in_at,
                    ticket_type_name: ticket_type.name.clone(),
                    event_id: event.id,
                    event_title: event.title.clone(),
                    event_date: event.date,
                    seller_id: event.seller_id,
                    holder_name: holder.and_then(|p| p.full_name.clone()),
                    holder_email: holder.and_then(|p| p.email.clone()),
                })
            }))
    }

    async fn check_in_ticket(
        &self,
        ticket_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Ticket>> {
        let mut state = self.state.lock().await;
        Ok(state
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id && t.status == TicketStatus::Valid)
            .map(|t| {
                t.status = TicketStatus::Used;
                t.checked_in_at = Some(at);
                t.clone()
            }))
    }

    async fn seller_for_user(&self, user_id: Uuid) -> AppResult<Option<Seller>> {
        let state = self.state.lock().await;
        Ok(state.sellers.iter().find(|s| s.user_id == user_id).cloned())
    }

    async fn create_seller(&self, user_id: Uuid, seller: &NewSeller) -> AppResult<Seller> {
        let mut state = self.state.lock().await;
        if state.sellers.iter().any(|s| s.user_id == user_id) {
            return Err(AppError::Conflict(
                "This account is already a seller".to_string(),
            ));
        }
        let now = Utc::now();
        let created = Seller {
            id: Uuid::new_v4(),
            user_id,
            business_name: seller.business_name.clone(),
            business_email: seller.business_email.clone(),
            verified: false,
            tier: "bronze".to_string(),
            created_at: now,
            updated_at: now,
        };
        state.sellers.push(created.clone());
        Ok(created)
    }

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.state.lock().await.profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> AppResult<Profile> {
        let mut state = self.state.lock().await;
        let profile = state.profiles.entry(user_id).or_insert_with(|| Profile {
            user_id,
            full_name: None,
            email: None,
            phone: None,
            updated_at: Utc::now(),
        });
        if update.full_name.is_some() {
            profile.full_name = update.full_name.clone();
        }
        if update.email.is_some() {
            profile.email = update.email.clone();
        }
        if update.phone.is_some() {
            profile.phone = update.phone.clone();
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn preferences(&self, user_id: Uuid) -> AppResult<Option<UserPreferences>> {
        Ok(self.state.lock().await.preferences.get(&user_id).cloned())
    }

    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        prefs: &UserPreferences,
    ) -> AppResult<UserPreferences> {
        self.state
            .lock()
            .await
            .preferences
            .insert(user_id, prefs.clone());
        Ok(prefs.clone())
    }

    async fn toggle_favorite(&self, user_id: Uuid, event_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.favorites.len();
        state
            .favorites
            .retain(|(u, e, _)| !(*u == user_id && *e == event_id));
        if state.favorites.len() < before {
            return Ok(false);
        }
        state.favorites.push((user_id, event_id, Utc::now()));
        Ok(true)
    }

    async fn favorite_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        Ok(state
            .favorites
            .iter()
            .rev()
            .filter(|(u, _, _)| *u == user_id)
            .map(|(_, e, _)| *e)
            .collect())
    }

    async fn reviews_for_event(&self, event_id: Uuid) -> AppResult<Vec<Review>> {
        let state = self.state.lock().await;
        Ok(state
            .reviews
            .iter()
            .rev()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn add_review(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        review: &NewReview,
    ) -> AppResult<Review> {
        let mut state = self.state.lock().await;
        if state
            .reviews
            .iter()
            .any(|r| r.event_id == event_id && r.user_id == user_id)
        {
            return Err(AppError::Conflict(
                "You have already reviewed this event".to_string(),
            ));
        }
        let created = Review {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        };
        state.reviews.push(created.clone());
        Ok(created)
    }
}
