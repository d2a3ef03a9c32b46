use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{EventFlag, MarketplaceStore};
use crate::config::Config;
use crate::models::ticket::generate_qr_code;
use crate::models::{
    CartItem, CheckoutDraft, Event, EventDetail, EventFilter, NewEvent, NewPromoCode, NewReview,
    NewSeller, Order, OrderDraft, Profile, ProfileUpdate, PromoCode, Review, Seller, Ticket,
    TicketLookup, TicketType, TicketView, UserPreferences,
};
use crate::utils::error::conflict_on_unique;
use crate::utils::{AppError, AppResult};

const EVENT_SELECT: &str = "SELECT e.id, e.seller_id, e.venue_id, e.title, e.description, \
     e.category, e.date, e.start_time, e.end_time, e.tags, e.cover_image, e.is_featured, \
     e.is_hot, e.total_tickets, e.sold_tickets, e.status, v.name AS venue_name, \
     v.city AS venue_city, e.created_at, e.updated_at \
     FROM events e LEFT JOIN venues v ON v.id = e.venue_id";

const LISTED: &str = "e.status IN ('active', 'sold-out')";

const CART_SELECT: &str = "SELECT c.id, c.ticket_type_id, c.quantity, \
     t.name AS ticket_type_name, t.price, t.max_per_order, t.event_id, e.title AS event_title \
     FROM cart_items c \
     JOIN ticket_types t ON t.id = c.ticket_type_id \
     JOIN events e ON e.id = t.event_id";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and runs pending migrations.
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;
        tracing::info!("Successfully connected to database");

        sqlx::migrate!().run(&pool).await?;
        tracing::info!("Migrations run successfully");

        Ok(Self::new(pool))
    }

    async fn event_in_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<Event> {
        let sql = format!("{EVENT_SELECT} WHERE e.id = $1");
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_one(&mut **tx)
            .await?)
    }

    async fn insert_order(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        promo_code_id: Option<Uuid>,
        draft: &OrderDraft,
    ) -> AppResult<Order> {
        let reserved = sqlx::query(
            "UPDATE events SET sold_tickets = sold_tickets + $2, updated_at = now() \
             WHERE id = $1 AND status = 'active' AND sold_tickets + $2 <= total_tickets",
        )
        .bind(draft.event_id)
        .bind(draft.ticket_count())
        .execute(&mut **tx)
        .await?;
        if reserved.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Event {} is no longer available for purchase",
                draft.event_id
            )));
        }

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders \
             (id, user_id, event_id, status, subtotal, discount_amount, total_amount, promo_code_id) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(draft.event_id)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.total)
        .bind(promo_code_id)
        .fetch_one(&mut **tx)
        .await?;

        for line in &draft.lines {
            let sold = sqlx::query(
                "UPDATE ticket_types SET sold = sold + $3 \
                 WHERE id = $1 AND event_id = $2 AND sold + $3 <= quantity",
            )
            .bind(line.ticket_type_id)
            .bind(draft.event_id)
            .bind(line.quantity)
            .execute(&mut **tx)
            .await?;
            if sold.rows_affected() == 0 {
                return Err(AppError::Conflict(format!(
                    "Not enough tickets left for ticket type {}",
                    line.ticket_type_id
                )));
            }

            for _ in 0..line.quantity {
                sqlx::query(
                    "INSERT INTO tickets (id, order_id, ticket_type_id, user_id, qr_code, status) \
                     VALUES ($1, $2, $3, $4, $5, 'pending')",
                )
                .bind(Uuid::new_v4())
                .bind(order.id)
                .bind(line.ticket_type_id)
                .bind(user_id)
                .bind(generate_qr_code())
                .execute(&mut **tx)
                .await?;
            }
        }

        Ok(order)
    }
}

#[async_trait]
impl MarketplaceStore for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self))]
    async fn list_events(&self, filter: &EventFilter) -> AppResult<Vec<Event>> {
        let sql = format!(
            "{EVENT_SELECT} WHERE {LISTED} \
             AND ($1::text IS NULL OR e.category = $1) \
             AND ($2::text IS NULL OR lower(v.city) = lower($2)) \
             ORDER BY e.date, e.start_time"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(filter.category.as_deref())
            .bind(filter.city.as_deref())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn flagged_events(&self, flag: EventFlag, limit: i64) -> AppResult<Vec<Event>> {
        let column = match flag {
            EventFlag::Featured => "e.is_featured",
            EventFlag::Hot => "e.is_hot",
        };
        let sql = format!(
            "{EVENT_SELECT} WHERE {LISTED} AND {column} ORDER BY e.date, e.start_time LIMIT $1"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_event(&self, id: Uuid) -> AppResult<Option<Event>> {
        let sql = format!("{EVENT_SELECT} WHERE e.id = $1");
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> AppResult<Vec<TicketType>> {
        Ok(sqlx::query_as::<_, TicketType>(
            "SELECT * FROM ticket_types WHERE event_id = $1 ORDER BY price, name",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_ticket_type(&self, id: Uuid) -> AppResult<Option<TicketType>> {
        Ok(
            sqlx::query_as::<_, TicketType>("SELECT * FROM ticket_types WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    #[instrument(skip(self, event), fields(title = %event.title))]
    async fn create_event(&self, seller_id: Uuid, event: &NewEvent) -> AppResult<EventDetail> {
        let mut tx = self.pool.begin().await?;

        let venue_id = match (&event.venue, event.venue_id) {
            (Some(venue), _) => {
                let id = Uuid::new_v4();
                sqlx::query("INSERT INTO venues (id, name, address, city) VALUES ($1, $2, $3, $4)")
                    .bind(id)
                    .bind(&venue.name)
                    .bind(&venue.address)
                    .bind(&venue.city)
                    .execute(&mut *tx)
                    .await?;
                Some(id)
            }
            (None, existing) => existing,
        };

        let event_id = Uuid::new_v4();
        let total_tickets: i32 = event.ticket_types.iter().map(|t| t.quantity).sum();
        sqlx::query(
            "INSERT INTO events (id, seller_id, venue_id, title, description, category, date, \
             start_time, end_time, tags, cover_image, is_featured, is_hot, total_tickets) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(event_id)
        .bind(seller_id)
        .bind(venue_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.category)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.tags)
        .bind(&event.cover_image)
        .bind(event.is_featured)
        .bind(event.is_hot)
        .bind(total_tickets)
        .execute(&mut *tx)
        .await?;

        let mut ticket_types = Vec::with_capacity(event.ticket_types.len());
        for ticket_type in &event.ticket_types {
            let row = sqlx::query_as::<_, TicketType>(
                "INSERT INTO ticket_types \
                 (id, event_id, name, description, price, quantity, max_per_order, benefits) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(&ticket_type.name)
            .bind(&ticket_type.description)
            .bind(ticket_type.price)
            .bind(ticket_type.quantity)
            .bind(ticket_type.max_per_order)
            .bind(&ticket_type.benefits)
            .fetch_one(&mut *tx)
            .await?;
            ticket_types.push(row);
        }

        let created = Self::event_in_tx(&mut tx, event_id).await?;
        tx.commit().await?;

        Ok(EventDetail {
            event: created,
            ticket_types,
        })
    }

    async fn upcoming_events(&self, from: NaiveDate, limit: i64) -> AppResult<Vec<Event>> {
        let sql = format!(
            "{EVENT_SELECT} WHERE {LISTED} AND e.date >= $1 \
             ORDER BY e.date, e.start_time LIMIT $2"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(from)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn popular_events(&self, limit: i64) -> AppResult<Vec<Event>> {
        let sql = format!("{EVENT_SELECT} WHERE {LISTED} ORDER BY e.sold_tickets DESC LIMIT $1");
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn events_for_seller(&self, seller_id: Uuid) -> AppResult<Vec<Event>> {
        let sql = format!("{EVENT_SELECT} WHERE e.seller_id = $1 ORDER BY e.date");
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(seller_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn cart_items(&self, user_id: Uuid) -> AppResult<Vec<CartItem>> {
        let sql = format!("{CART_SELECT} WHERE c.user_id = $1 ORDER BY c.created_at");
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn add_to_cart(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO cart_items (id, user_id, ticket_type_id, quantity) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, ticket_type_id) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(ticket_type_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_cart_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND user_id = $2")
                .bind(item_id)
                .bind(user_id)
                .bind(quantity)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn active_promo_codes(&self, code: &str) -> AppResult<Vec<PromoCode>> {
        Ok(sqlx::query_as::<_, PromoCode>(
            "SELECT * FROM promo_codes WHERE code = $1 AND is_active",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_promo_code(
        &self,
        seller_id: Uuid,
        code: &str,
        promo: &NewPromoCode,
    ) -> AppResult<PromoCode> {
        sqlx::query_as::<_, PromoCode>(
            "INSERT INTO promo_codes (id, seller_id, code, discount_type, discount_value, \
             max_uses, expires_at, min_purchase, event_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(code)
        .bind(promo.discount_type)
        .bind(promo.discount_value)
        .bind(promo.max_uses)
        .bind(promo.expires_at)
        .bind(promo.min_purchase)
        .bind(promo.event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "A promo code with this text already exists"))
    }

    async fn promo_codes_for_seller(&self, seller_id: Uuid) -> AppResult<Vec<PromoCode>> {
        Ok(sqlx::query_as::<_, PromoCode>(
            "SELECT * FROM promo_codes WHERE seller_id = $1 ORDER BY created_at DESC",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_promo_code(&self, seller_id: Uuid, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM promo_codes WHERE id = $1 AND seller_id = $2")
            .bind(id)
            .bind(seller_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, draft), fields(user_id = %draft.user_id, orders = draft.orders.len()))]
    async fn place_orders(&self, draft: &CheckoutDraft) -> AppResult<Vec<Order>> {
        let mut tx = self.pool.begin().await?;

        if let Some(promo_id) = draft.promo_code_id {
            let redeemed = sqlx::query(
                "UPDATE promo_codes SET used_count = used_count + 1 \
                 WHERE id = $1 AND is_active AND (max_uses IS NULL OR used_count < max_uses)",
            )
            .bind(promo_id)
            .execute(&mut *tx)
            .await?;
            if redeemed.rows_affected() == 0 {
                return Err(AppError::Conflict(
                    "This promo code has reached its usage limit".to_string(),
                ));
            }
        }

        let mut orders = Vec::with_capacity(draft.orders.len());
        for order in &draft.orders {
            orders.push(Self::insert_order(&mut tx, draft.user_id, draft.promo_code_id, order).await?);
        }

        tx.commit().await?;
        debug!(count = orders.len(), "Orders placed");
        Ok(orders)
    }

    async fn set_payment_reference(&self, order_ids: &[Uuid], reference: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE orders SET payment_reference = $2, updated_at = now() WHERE id = ANY($1)",
        )
        .bind(order_ids)
        .bind(reference)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn orders_by_reference(&self, reference: &str) -> AppResult<Vec<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE payment_reference = $1 ORDER BY created_at",
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn complete_orders(&self, order_ids: &[Uuid]) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        let completed: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE orders SET status = 'completed', updated_at = now() \
             WHERE id = ANY($1) AND status = 'pending' RETURNING id",
        )
        .bind(order_ids)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE tickets SET status = 'valid' WHERE order_id = ANY($1) AND status = 'pending'",
        )
        .bind(&completed)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(completed.len() as u64)
    }

    async fn completed_orders_for_events(&self, event_ids: &[Uuid]) -> AppResult<Vec<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE event_id = ANY($1) AND status = 'completed'",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn purchased_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(sqlx::query_scalar(
            "SELECT DISTINCT event_id FROM orders WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn tickets_for_user(&self, user_id: Uuid) -> AppResult<Vec<TicketView>> {
        Ok(sqlx::query_as::<_, TicketView>(
            "SELECT t.id, t.qr_code, t.status, t.checked_in_at, tt.name AS ticket_type_name, \
             tt.price, e.id AS event_id, e.title AS event_title, e.date AS event_date, \
             v.name AS venue_name \
             FROM tickets t \
             JOIN ticket_types tt ON tt.id = t.ticket_type_id \
             JOIN events e ON e.id = tt.event_id \
             LEFT JOIN venues v ON v.id = e.venue_id \
             WHERE t.user_id = $1 AND t.status <> 'pending' \
             ORDER BY e.date, t.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_ticket_by_qr(&self, qr_code: &str) -> AppResult<Option<TicketLookup>> {
        Ok(sqlx::query_as::<_, TicketLookup>(
            "SELECT t.id, t.qr_code, t.status, t.checked_in_at, tt.name AS ticket_type_name, \
             e.id AS event_id, e.title AS event_title, e.date AS event_date, e.seller_id, \
             p.full_name AS holder_name, p.email AS holder_email \
             FROM tickets t \
             JOIN ticket_types tt ON tt.id = t.ticket_type_id \
             JOIN events e ON e.id = tt.event_id \
             LEFT JOIN profiles p ON p.user_id = t.user_id \
             WHERE t.qr_code = $1",
        )
        .bind(qr_code)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn check_in_ticket(
        &self,
        ticket_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Ticket>> {
        Ok(sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET status = 'used', checked_in_at = $2 \
             WHERE id = $1 AND status = 'valid' RETURNING *",
        )
        .bind(ticket_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn seller_for_user(&self, user_id: Uuid) -> AppResult<Option<Seller>> {
        Ok(
            sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_seller(&self, user_id: Uuid, seller: &NewSeller) -> AppResult<Seller> {
        sqlx::query_as::<_, Seller>(
            "INSERT INTO sellers (id, user_id, business_name, business_email) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&seller.business_name)
        .bind(&seller.business_email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "This account is already a seller"))
    }

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn upsert_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> AppResult<Profile> {
        Ok(sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (user_id, full_name, email, phone) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
             full_name = COALESCE(EXCLUDED.full_name, profiles.full_name), \
             email = COALESCE(EXCLUDED.email, profiles.email), \
             phone = COALESCE(EXCLUDED.phone, profiles.phone), \
             updated_at = now() \
             RETURNING *",
        )
        .bind(user_id)
        .bind(&update.full_name)
        .bind(&update.email)
        .bind(&update.phone)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn preferences(&self, user_id: Uuid) -> AppResult<Option<UserPreferences>> {
        Ok(sqlx::query_as::<_, UserPreferences>(
            "SELECT favorite_categories, favorite_cities FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        prefs: &UserPreferences,
    ) -> AppResult<UserPreferences> {
        Ok(sqlx::query_as::<_, UserPreferences>(
            "INSERT INTO user_preferences (user_id, favorite_categories, favorite_cities) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET \
             favorite_categories = EXCLUDED.favorite_categories, \
             favorite_cities = EXCLUDED.favorite_cities, \
             updated_at = now() \
             RETURNING favorite_categories, favorite_cities",
        )
        .bind(user_id)
        .bind(&prefs.favorite_categories)
        .bind(&prefs.favorite_cities)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn toggle_favorite(&self, user_id: Uuid, event_id: Uuid) -> AppResult<bool> {
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO favorites (user_id, event_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn favorite_event_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(sqlx::query_scalar(
            "SELECT event_id FROM favorites WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn reviews_for_event(&self, event_id: Uuid) -> AppResult<Vec<Review>> {
        Ok(sqlx::query_as::<_, Review>(
            "SELECT * FROM event_reviews WHERE event_id = $1 ORDER BY created_at DESC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn add_review(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        review: &NewReview,
    ) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(
            "INSERT INTO event_reviews (id, event_id, user_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "You have already reviewed this event"))
    }
}

/// These run against a live database and are skipped when `DATABASE_URL` is unset.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscountType, DraftLine, NewTicketType};
    use chrono::NaiveTime;
    use rust_decimal::Decimal;

    async fn store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        Some(PgStore::new(pool))
    }

    async fn seeded(store: &PgStore, quantity: i32) -> (Seller, EventDetail) {
        let seller = store
            .create_seller(
                Uuid::new_v4(),
                &NewSeller {
                    business_name: "Test Seller".to_string(),
                    business_email: None,
                },
            )
            .await
            .unwrap();
        let event = NewEvent {
            title: "Show".to_string(),
            description: None,
            category: "music".to_string(),
            date: Utc::now().date_naive(),
            start_time: NaiveTime::MIN,
            end_time: None,
            tags: Vec::new(),
            cover_image: None,
            is_featured: false,
            is_hot: false,
            venue_id: None,
            venue: None,
            ticket_types: vec![NewTicketType {
                name: "GA".to_string(),
                description: None,
                price: Decimal::from(1000),
                quantity,
                max_per_order: None,
                benefits: Vec::new(),
            }],
        };
        let detail = store.create_event(seller.id, &event).await.unwrap();
        (seller, detail)
    }

    async fn promo(store: &PgStore, seller: &Seller, max_uses: Option<i32>) -> PromoCode {
        let code = Uuid::new_v4().simple().to_string()[..10].to_uppercase();
        store
            .create_promo_code(
                seller.id,
                &code,
                &NewPromoCode {
                    code: None,
                    discount_type: DiscountType::Percentage,
                    discount_value: Decimal::from(10),
                    max_uses,
                    min_purchase: None,
                    expires_at: None,
                    event_id: None,
                },
            )
            .await
            .unwrap()
    }

    async fn used_count(store: &PgStore, seller: &Seller, id: Uuid) -> i32 {
        store
            .promo_codes_for_seller(seller.id)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.id == id)
            .map(|p| p.used_count)
            .unwrap()
    }

    fn draft(user_id: Uuid, detail: &EventDetail, quantity: i32, promo: Option<Uuid>) -> CheckoutDraft {
        let subtotal = Decimal::from(1000 * quantity);
        CheckoutDraft {
            user_id,
            orders: vec![OrderDraft {
                event_id: detail.event.id,
                lines: vec![DraftLine {
                    ticket_type_id: detail.ticket_types[0].id,
                    quantity,
                }],
                subtotal,
                discount: Decimal::ZERO,
                total: subtotal,
            }],
            promo_code_id: promo,
        }
    }

    #[tokio::test]
    async fn test_oversell_rolls_back_counts_and_promo() {
        let Some(store) = store().await else { return };
        let (seller, detail) = seeded(&store, 2).await;
        let code = promo(&store, &seller, None).await;

        let err = store
            .place_orders(&draft(Uuid::new_v4(), &detail, 3, Some(code.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let event = store.get_event(detail.event.id).await.unwrap().unwrap();
        assert_eq!(event.sold_tickets, 0);
        let ticket_type = store.get_ticket_type(detail.ticket_types[0].id).await.unwrap().unwrap();
        assert_eq!(ticket_type.sold, 0);
        assert_eq!(used_count(&store, &seller, code.id).await, 0);
    }

    #[tokio::test]
    async fn test_promo_usage_cap_is_enforced() {
        let Some(store) = store().await else { return };
        let (seller, detail) = seeded(&store, 10).await;
        let code = promo(&store, &seller, Some(1)).await;

        store
            .place_orders(&draft(Uuid::new_v4(), &detail, 1, Some(code.id)))
            .await
            .unwrap();
        let err = store
            .place_orders(&draft(Uuid::new_v4(), &detail, 1, Some(code.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert_eq!(used_count(&store, &seller, code.id).await, 1);
        let event = store.get_event(detail.event.id).await.unwrap().unwrap();
        assert_eq!(event.sold_tickets, 1);
    }

    #[tokio::test]
    async fn test_complete_orders_only_once() {
        let Some(store) = store().await else { return };
        let (_, detail) = seeded(&store, 5).await;
        let user = Uuid::new_v4();
        let orders = store.place_orders(&draft(user, &detail, 2, None)).await.unwrap();
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

        assert_eq!(store.complete_orders(&ids).await.unwrap(), 1);
        assert_eq!(store.complete_orders(&ids).await.unwrap(), 0);

        let tickets = store.tickets_for_user(user).await.unwrap();
        assert_eq!(tickets.len(), 2);
        assert!(tickets.iter().all(|t| t.status == crate::models::TicketStatus::Valid));
    }
}
