//! Turning a cart into pending orders and a payment session.
//!
//! A checkout is priced here and persisted by [`MarketplaceStore::place_orders`]
//! in one transaction. Every order of the checkout shares one payment
//! reference, so a single gateway payment settles a multi-event cart.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    AppliedPromo, CartItem, CheckoutDraft, EventStatus, Order, OrderDraft, DraftLine,
};
use crate::payments::{PaymentRequest, PaymentSession};
use crate::services::promo;
use crate::state::AppState;
use crate::store::MarketplaceStore;
use crate::utils::{AppError, AppResult};

/// Multiplier applied after discounts: a 5% service fee.
pub const SERVICE_FEE_MULTIPLIER: Decimal = Decimal::from_parts(105, 0, 0, false, 2);

const FALLBACK_CUSTOMER_NAME: &str = "TixHub Customer";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    /// Waiting for the buyer to pay at `payment.checkout_url`.
    Pending,
    /// Nothing to pay; tickets were issued immediately.
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub status: CheckoutStatus,
    pub payment_reference: String,
    pub orders: Vec<Order>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub promo: Option<AppliedPromo>,
    pub payment: Option<PaymentSession>,
}

/// Cart lines of one event, in the order they first appear in the cart.
#[derive(Debug)]
pub struct EventGroup<'a> {
    pub event_id: Uuid,
    pub items: Vec<&'a CartItem>,
}

impl EventGroup<'_> {
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(|item| item.line_total()).sum()
    }
}

pub fn group_by_event(items: &[CartItem]) -> Vec<EventGroup<'_>> {
    let mut groups: Vec<EventGroup<'_>> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|g| g.event_id == item.event_id) {
            Some(group) => group.items.push(item),
            None => groups.push(EventGroup {
                event_id: item.event_id,
                items: vec![item],
            }),
        }
    }
    groups
}

/// Splits `discount` across `subtotals` proportionally. Shares are floored to
/// kobo, then the leftover kobo are handed out from the last group backwards.
/// No share exceeds its subtotal and the parts sum to `discount` (capped at the
/// combined subtotal).
pub fn allocate_discount(subtotals: &[Decimal], discount: Decimal) -> Vec<Decimal> {
    let total: Decimal = subtotals.iter().copied().sum();
    if subtotals.is_empty() || discount.is_zero() || total.is_zero() {
        return vec![Decimal::ZERO; subtotals.len()];
    }
    let discount = discount.min(total);

    let mut shares: Vec<Decimal> = subtotals
        .iter()
        .map(|subtotal| {
            (discount * *subtotal / total).round_dp_with_strategy(2, RoundingStrategy::ToZero)
        })
        .collect();

    let mut remaining = discount - shares.iter().copied().sum::<Decimal>();
    for (share, subtotal) in shares.iter_mut().zip(subtotals).rev() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let extra = remaining.min(*subtotal - *share);
        *share += extra;
        remaining -= extra;
    }
    shares
}

pub fn order_total(subtotal: Decimal, discount: Decimal) -> Decimal {
    (subtotal - discount) * SERVICE_FEE_MULTIPLIER
}

pub fn payment_reference(first_order_id: Uuid, now: DateTime<Utc>) -> String {
    format!("TIX-{}-{}", first_order_id, now.timestamp_millis())
}

fn validate_items(items: &[CartItem]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::ValidationError("Your cart is empty".to_string()));
    }
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::ValidationError(format!(
                "Quantity for {} must be at least 1",
                item.ticket_type_name
            )));
        }
        if let Some(max) = item.max_per_order {
            if item.quantity > max {
                return Err(AppError::ValidationError(format!(
                    "You can buy at most {max} {} tickets per order",
                    item.ticket_type_name
                )));
            }
        }
    }
    Ok(())
}

/// Resolves the promo for this cart and the discount it yields on the eligible lines.
async fn resolve_promo(
    store: &dyn MarketplaceStore,
    code: &str,
    groups: &[EventGroup<'_>],
    now: DateTime<Utc>,
) -> AppResult<AppliedPromo> {
    let code = promo::normalize_code(code);
    let candidates = store.active_promo_codes(&code).await?;
    let event_ids: Vec<Uuid> = groups.iter().map(|g| g.event_id).collect();
    let chosen = promo::select_candidate(&candidates, &event_ids)
        .ok_or(promo::PromoRejection::NotFound)?;

    let eligible: Decimal = groups
        .iter()
        .filter(|g| chosen.event_id.map_or(true, |id| id == g.event_id))
        .map(EventGroup::subtotal)
        .sum();
    let amount = promo::evaluate(chosen, eligible, now)?;
    Ok(promo::applied(chosen, amount))
}

/// Prices each event group, spreading the promo discount over the groups it applies to.
pub fn build_drafts(groups: &[EventGroup<'_>], applied: Option<&AppliedPromo>) -> Vec<OrderDraft> {
    let eligible: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| {
            applied.is_some_and(|p| p.event_id.map_or(true, |id| id == g.event_id))
        })
        .map(|(i, _)| i)
        .collect();
    let eligible_subtotals: Vec<Decimal> = eligible.iter().map(|&i| groups[i].subtotal()).collect();
    let shares = allocate_discount(
        &eligible_subtotals,
        applied.map_or(Decimal::ZERO, |p| p.amount),
    );

    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let subtotal = group.subtotal();
            let discount = eligible
                .iter()
                .position(|&e| e == i)
                .map_or(Decimal::ZERO, |pos| shares[pos]);
            OrderDraft {
                event_id: group.event_id,
                lines: group
                    .items
                    .iter()
                    .map(|item| DraftLine {
                        ticket_type_id: item.ticket_type_id,
                        quantity: item.quantity,
                    })
                    .collect(),
                subtotal,
                discount,
                total: order_total(subtotal, discount),
            }
        })
        .collect()
}

pub async fn checkout(
    state: &AppState,
    user_id: Uuid,
    request: &CheckoutRequest,
) -> AppResult<CheckoutResponse> {
    let store = state.store.as_ref();
    let now = Utc::now();

    let items = store.cart_items(user_id).await?;
    validate_items(&items)?;
    let groups = group_by_event(&items);

    for group in &groups {
        let event = store
            .get_event(group.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", group.event_id)))?;
        if event.status != EventStatus::Active {
            return Err(AppError::Conflict(format!(
                "{} is not on sale",
                event.title
            )));
        }
    }

    let profile = store.profile(user_id).await?;
    let customer_email = profile
        .as_ref()
        .and_then(|p| p.email.clone())
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| {
            AppError::ValidationError("Add an email address to your profile before checkout".to_string())
        })?;
    let customer_name = profile
        .and_then(|p| p.full_name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_CUSTOMER_NAME.to_string());

    let applied = match request.promo_code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(resolve_promo(store, code, &groups, now).await?),
        None => None,
    };

    let drafts = build_drafts(&groups, applied.as_ref());
    let subtotal: Decimal = drafts.iter().map(|d| d.subtotal).sum();
    let discount: Decimal = drafts.iter().map(|d| d.discount).sum();
    let total: Decimal = drafts.iter().map(|d| d.total).sum();

    let orders = store
        .place_orders(&CheckoutDraft {
            user_id,
            orders: drafts,
            promo_code_id: applied.as_ref().map(|p| p.id),
        })
        .await?;
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let first_order = order_ids
        .first()
        .copied()
        .ok_or_else(|| AppError::InternalServerError("checkout produced no orders".to_string()))?;

    let reference = payment_reference(first_order, now);
    store.set_payment_reference(&order_ids, &reference).await?;
    let orders: Vec<Order> = orders
        .into_iter()
        .map(|o| Order {
            payment_reference: Some(reference.clone()),
            ..o
        })
        .collect();

    info!(
        %user_id,
        reference = %reference,
        orders = orders.len(),
        %total,
        "Checkout orders placed"
    );

    if total.is_zero() {
        store.complete_orders(&order_ids).await?;
        store.clear_cart(user_id).await?;
        info!(reference = %reference, "Zero-total checkout completed without payment");
        let orders = store.orders_by_reference(&reference).await?;
        return Ok(CheckoutResponse {
            status: CheckoutStatus::Completed,
            payment_reference: reference,
            orders,
            subtotal,
            discount,
            total,
            promo: applied,
            payment: None,
        });
    }

    let description = match groups.as_slice() {
        [only] => format!("Tickets for {}", only.items[0].event_title),
        _ => format!("Tickets for {} events", groups.len()),
    };
    let session = state
        .payments
        .initialize(&PaymentRequest {
            payment_reference: reference.clone(),
            amount: total.round_dp(2),
            customer_name,
            customer_email,
            description,
            redirect_url: state.config.payment_redirect_url.clone(),
        })
        .await
        .map_err(|err| {
            warn!(reference = %reference, error = %err, "Payment initialization failed; orders left pending");
            AppError::from(err)
        })?;

    Ok(CheckoutResponse {
        status: CheckoutStatus::Pending,
        payment_reference: reference,
        orders,
        subtotal,
        discount,
        total,
        promo: applied,
        payment: Some(session),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscountType, NewPromoCode, OrderStatus, TicketStatus};
    use crate::payments::FakeGateway;
    use crate::services::fixtures::{self, buyer, event, new_event, seller, ticket_type};

    fn item(event_id: Uuid, price: i64, quantity: i32) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            ticket_type_id: Uuid::new_v4(),
            quantity,
            ticket_type_name: "Regular".to_string(),
            price: Decimal::from(price),
            max_per_order: None,
            event_id,
            event_title: "Show".to_string(),
        }
    }

    fn percent(value: i64, event_id: Option<Uuid>) -> NewPromoCode {
        NewPromoCode {
            code: Some("SAVE20".to_string()),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(value),
            max_uses: None,
            min_purchase: None,
            expires_at: None,
            event_id,
        }
    }

    #[test]
    fn test_groups_keep_first_appearance_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![item(a, 100, 1), item(b, 200, 1), item(a, 50, 2)];
        let groups = group_by_event(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].event_id, a);
        assert_eq!(groups[0].subtotal(), Decimal::from(200));
        assert_eq!(groups[1].event_id, b);
    }

    #[test]
    fn test_allocation_sums_to_discount() {
        let subtotals = [Decimal::from(1000), Decimal::from(2000), Decimal::from(333)];
        let discount = Decimal::new(100000, 2);
        let shares = allocate_discount(&subtotals, discount);
        assert_eq!(shares.iter().copied().sum::<Decimal>(), discount);
        assert_eq!(shares[0], Decimal::new(30003, 2));
    }

    #[test]
    fn test_allocation_never_exceeds_a_subtotal() {
        let cent = Decimal::new(1, 2);
        let subtotals = [cent; 4];
        let discount = Decimal::new(2, 2);
        let shares = allocate_discount(&subtotals, discount);
        assert_eq!(shares.iter().copied().sum::<Decimal>(), discount);
        assert!(shares.iter().all(|share| *share <= cent && *share >= Decimal::ZERO));
    }

    #[test]
    fn test_allocation_without_discount_is_zero() {
        let shares = allocate_discount(&[Decimal::from(10), Decimal::from(20)], Decimal::ZERO);
        assert_eq!(shares, vec![Decimal::ZERO, Decimal::ZERO]);
    }

    #[test]
    fn test_order_total_applies_service_fee() {
        assert_eq!(
            order_total(Decimal::from(10000), Decimal::from(2000)),
            Decimal::from(8400)
        );
    }

    #[test]
    fn test_event_scoped_discount_only_touches_its_group() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![item(a, 1000, 1), item(b, 3000, 1)];
        let groups = group_by_event(&items);
        let applied = AppliedPromo {
            id: Uuid::new_v4(),
            code: "B".to_string(),
            discount_type: DiscountType::Fixed,
            event_id: Some(b),
            amount: Decimal::from(500),
        };
        let drafts = build_drafts(&groups, Some(&applied));
        assert_eq!(drafts[0].discount, Decimal::ZERO);
        assert_eq!(drafts[1].discount, Decimal::from(500));
    }

    #[test]
    fn test_payment_reference_shape() {
        let id = Uuid::new_v4();
        let reference = payment_reference(id, Utc::now());
        assert!(reference.starts_with(&format!("TIX-{id}-")));
    }

    #[tokio::test]
    async fn test_checkout_with_percentage_code() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let detail = event(
            &app.store,
            &seller,
            new_event("Afrobeats Night", "music", "Lagos", vec![ticket_type("Regular", 5000, 100)]),
        )
        .await;
        let user = buyer(&app.store).await;
        app.store
            .add_to_cart(user, detail.ticket_types[0].id, 2)
            .await
            .unwrap();
        let promo = app
            .store
            .create_promo_code(seller.id, "SAVE20", &percent(20, None))
            .await
            .unwrap();

        let response = checkout(
            &app.state,
            user,
            &CheckoutRequest {
                promo_code: Some(" save20 ".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(response.status, CheckoutStatus::Pending);
        assert_eq!(response.subtotal, Decimal::from(10000));
        assert_eq!(response.discount, Decimal::from(2000));
        assert_eq!(response.total, Decimal::from(8400));
        assert_eq!(response.orders.len(), 1);

        let request = app.payments.last_request().await.unwrap();
        assert_eq!(request.amount, Decimal::from(8400));
        assert_eq!(request.payment_reference, response.payment_reference);
        assert_eq!(request.customer_email, "ada@example.com");

        let tickets = app.store.tickets_for_order(response.orders[0].id).await;
        assert_eq!(tickets.len(), 2);
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Pending));
        assert_eq!(app.store.promo_code(promo.id).await.unwrap().used_count, 1);

        let stored = app.store.get_event(detail.event.id).await.unwrap().unwrap();
        assert_eq!(stored.sold_tickets, 2);
    }

    #[tokio::test]
    async fn test_multi_event_checkout_shares_one_reference() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let first = event(&app.store, &seller, new_event("One", "music", "Lagos", vec![ticket_type("A", 1000, 10)])).await;
        let second = event(&app.store, &seller, new_event("Two", "comedy", "Abuja", vec![ticket_type("B", 3000, 10)])).await;
        let user = buyer(&app.store).await;
        app.store.add_to_cart(user, first.ticket_types[0].id, 1).await.unwrap();
        app.store.add_to_cart(user, second.ticket_types[0].id, 1).await.unwrap();

        let response = checkout(&app.state, user, &CheckoutRequest::default())
            .await
            .unwrap();

        assert_eq!(response.orders.len(), 2);
        let stored = app
            .store
            .orders_by_reference(&response.payment_reference)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(app.payments.initialized.lock().await.len(), 1);
        assert_eq!(response.total, Decimal::from(4200));
    }

    #[tokio::test]
    async fn test_oversell_rolls_back_whole_checkout() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let plenty = event(&app.store, &seller, new_event("Plenty", "music", "Lagos", vec![ticket_type("A", 1000, 10)])).await;
        let scarce = event(&app.store, &seller, new_event("Scarce", "music", "Lagos", vec![ticket_type("B", 1000, 1)])).await;
        let user = buyer(&app.store).await;
        app.store.add_to_cart(user, plenty.ticket_types[0].id, 2).await.unwrap();
        app.store.add_to_cart(user, scarce.ticket_types[0].id, 2).await.unwrap();

        let err = checkout(&app.state, user, &CheckoutRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let untouched = app.store.get_event(plenty.event.id).await.unwrap().unwrap();
        assert_eq!(untouched.sold_tickets, 0);
        assert!(app.payments.initialized.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_code_is_rejected_at_checkout() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let detail = event(&app.store, &seller, new_event("Show", "music", "Lagos", vec![ticket_type("A", 1000, 10)])).await;
        let mut new_code = percent(10, None);
        new_code.max_uses = Some(1);
        app.store.create_promo_code(seller.id, "ONCE", &new_code).await.unwrap();

        for expect_ok in [true, false] {
            let user = buyer(&app.store).await;
            app.store.add_to_cart(user, detail.ticket_types[0].id, 1).await.unwrap();
            let result = checkout(
                &app.state,
                user,
                &CheckoutRequest {
                    promo_code: Some("ONCE".to_string()),
                },
            )
            .await;
            assert_eq!(result.is_ok(), expect_ok);
        }
    }

    #[tokio::test]
    async fn test_free_checkout_completes_without_gateway() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let detail = event(&app.store, &seller, new_event("Free Meetup", "tech", "Lagos", vec![ticket_type("RSVP", 0, 50)])).await;
        let user = buyer(&app.store).await;
        app.store.add_to_cart(user, detail.ticket_types[0].id, 1).await.unwrap();

        let response = checkout(&app.state, user, &CheckoutRequest::default())
            .await
            .unwrap();

        assert_eq!(response.status, CheckoutStatus::Completed);
        assert_eq!(response.orders[0].status, OrderStatus::Completed);
        assert!(response.payment.is_none());
        assert!(app.payments.initialized.lock().await.is_empty());
        assert!(app.store.cart_items(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_orders_pending() {
        let app = fixtures::test_app_with(FakeGateway::failing());
        let (_, seller) = seller(&app.store).await;
        let detail = event(&app.store, &seller, new_event("Show", "music", "Lagos", vec![ticket_type("A", 1000, 10)])).await;
        let user = buyer(&app.store).await;
        app.store.add_to_cart(user, detail.ticket_types[0].id, 1).await.unwrap();
        let promo = app
            .store
            .create_promo_code(seller.id, "SAVE20", &percent(20, None))
            .await
            .unwrap();

        let err = checkout(
            &app.state,
            user,
            &CheckoutRequest {
                promo_code: Some("SAVE20".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceError(_)));
        assert_eq!(app.store.cart_items(user).await.unwrap().len(), 1);

        // The pending order keeps its stock and promo redemption.
        let event = app.store.get_event(detail.event.id).await.unwrap().unwrap();
        assert_eq!(event.sold_tickets, 1);
        assert_eq!(app.store.promo_code(promo.id).await.unwrap().used_count, 1);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let app = fixtures::test_app();
        let user = buyer(&app.store).await;
        let err = checkout(&app.state, user, &CheckoutRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_inactive_event_is_not_sold() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let detail = event(&app.store, &seller, new_event("Show", "music", "Lagos", vec![ticket_type("A", 1000, 10)])).await;
        let user = buyer(&app.store).await;
        app.store.add_to_cart(user, detail.ticket_types[0].id, 1).await.unwrap();
        app.store
            .update_event(detail.event.id, |e| e.status = EventStatus::Cancelled)
            .await;

        let err = checkout(&app.state, user, &CheckoutRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
