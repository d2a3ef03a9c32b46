use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::OrderStatus;
use crate::payments::PaymentStatus;
use crate::state::AppState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment_reference: String,
    pub status: PaymentStatus,
    pub paid: bool,
    pub order_ids: Vec<Uuid>,
    pub amount_paid: Option<Decimal>,
    pub message: Option<String>,
}

/// Verifies a payment reference with the gateway and, once settled, issues
/// the tickets of every order that carries it. Safe to call repeatedly.
pub async fn verify_payment(state: &AppState, reference: &str) -> AppResult<PaymentOutcome> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(AppError::ValidationError(
            "paymentReference is required".to_string(),
        ));
    }

    let store = state.store.as_ref();
    let orders = store.orders_by_reference(reference).await?;
    if orders.is_empty() {
        return Err(AppError::NotFound(format!(
            "No orders found for payment reference {reference}"
        )));
    }
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

    if orders.iter().all(|o| o.status == OrderStatus::Completed) {
        info!(reference, "Payment already reconciled");
        return Ok(PaymentOutcome {
            payment_reference: reference.to_string(),
            status: PaymentStatus::Paid,
            paid: true,
            order_ids,
            amount_paid: None,
            message: Some("Payment already confirmed".to_string()),
        });
    }

    let verification = state.payments.verify(reference).await?;
    if !verification.status.is_settled() {
        info!(reference, status = ?verification.status, "Payment not settled yet");
        return Ok(PaymentOutcome {
            payment_reference: reference.to_string(),
            status: verification.status,
            paid: false,
            order_ids,
            amount_paid: verification.amount_paid,
            message: verification.message,
        });
    }

    let expected: Decimal = orders.iter().map(|o| o.total_amount).sum::<Decimal>().round_dp(2);
    if let Some(paid) = verification.amount_paid {
        if paid < expected {
            warn!(reference, %paid, %expected, "Gateway reported settlement below order total");
            return Ok(PaymentOutcome {
                payment_reference: reference.to_string(),
                status: PaymentStatus::PartiallyPaid,
                paid: false,
                order_ids,
                amount_paid: Some(paid),
                message: Some(format!("Received {paid} of {expected}")),
            });
        }
    }

    let pending: Vec<Uuid> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Pending)
        .map(|o| o.id)
        .collect();
    let completed = store.complete_orders(&pending).await?;

    let mut buyers: Vec<Uuid> = orders.iter().map(|o| o.user_id).collect();
    buyers.sort();
    buyers.dedup();
    for user_id in buyers {
        store.clear_cart(user_id).await?;
    }

    info!(reference, completed, status = ?verification.status, "Payment confirmed, tickets issued");
    Ok(PaymentOutcome {
        payment_reference: reference.to_string(),
        status: verification.status,
        paid: true,
        order_ids,
        amount_paid: verification.amount_paid,
        message: verification.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketStatus;
    use crate::services::checkout::{checkout, CheckoutRequest};
    use crate::services::fixtures::{self, buyer, event, new_event, seller, ticket_type};
    use crate::store::MarketplaceStore;

    async fn pending_checkout(app: &fixtures::TestApp) -> (Uuid, String) {
        let (_, seller) = seller(&app.store).await;
        let one = event(&app.store, &seller, new_event("One", "music", "Lagos", vec![ticket_type("A", 1000, 10)])).await;
        let two = event(&app.store, &seller, new_event("Two", "music", "Lagos", vec![ticket_type("B", 2000, 10)])).await;
        let user = buyer(&app.store).await;
        app.store.add_to_cart(user, one.ticket_types[0].id, 1).await.unwrap();
        app.store.add_to_cart(user, two.ticket_types[0].id, 2).await.unwrap();
        let response = checkout(&app.state, user, &CheckoutRequest::default())
            .await
            .unwrap();
        (user, response.payment_reference)
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let app = fixtures::test_app();
        let err = verify_payment(&app.state, "TIX-missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pending_payment_leaves_orders_pending() {
        let app = fixtures::test_app();
        let (user, reference) = pending_checkout(&app).await;

        let outcome = verify_payment(&app.state, &reference).await.unwrap();
        assert!(!outcome.paid);
        assert_eq!(outcome.status, PaymentStatus::Pending);
        assert!(app.store.tickets_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paid_reference_completes_every_order_once() {
        let app = fixtures::test_app();
        let (user, reference) = pending_checkout(&app).await;
        app.payments
            .mark(&reference, PaymentStatus::Paid, Some(Decimal::from(5250)))
            .await;

        let outcome = verify_payment(&app.state, &reference).await.unwrap();
        assert!(outcome.paid);
        assert_eq!(outcome.order_ids.len(), 2);

        let orders = app.store.orders_by_reference(&reference).await.unwrap();
        assert!(orders.iter().all(|o| o.status == OrderStatus::Completed));
        let tickets = app.store.tickets_for_user(user).await.unwrap();
        assert_eq!(tickets.len(), 3);
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Valid));
        assert!(app.store.cart_items(user).await.unwrap().is_empty());

        let again = verify_payment(&app.state, &reference).await.unwrap();
        assert!(again.paid);
        assert_eq!(app.store.tickets_for_user(user).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_partial_payment_does_not_issue_tickets() {
        let app = fixtures::test_app();
        let (user, reference) = pending_checkout(&app).await;
        app.payments
            .mark(&reference, PaymentStatus::PartiallyPaid, Some(Decimal::from(100)))
            .await;

        let outcome = verify_payment(&app.state, &reference).await.unwrap();
        assert!(!outcome.paid);
        assert_eq!(outcome.status, PaymentStatus::PartiallyPaid);
        assert!(app.store.tickets_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_below_total_is_treated_as_partial() {
        let app = fixtures::test_app();
        let (user, reference) = pending_checkout(&app).await;
        app.payments
            .mark(&reference, PaymentStatus::Paid, Some(Decimal::from(100)))
            .await;

        let outcome = verify_payment(&app.state, &reference).await.unwrap();
        assert!(!outcome.paid);
        assert_eq!(outcome.status, PaymentStatus::PartiallyPaid);
        assert!(app.store.tickets_for_user(user).await.unwrap().is_empty());
        let orders = app.store.orders_by_reference(&reference).await.unwrap();
        assert!(orders.iter().all(|o| o.status == OrderStatus::Pending));
        assert!(!app.store.cart_items(user).await.unwrap().is_empty());
    }
}
