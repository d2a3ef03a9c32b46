use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::models::{Seller, Ticket, TicketLookup, TicketStatus};
use crate::store::MarketplaceStore;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub ticket: TicketLookup,
    pub ready: bool,
    pub verdict: String,
}

pub fn verdict(ticket: &TicketLookup) -> String {
    match (ticket.status, ticket.checked_in_at) {
        (TicketStatus::Valid, _) => "ready".to_string(),
        (TicketStatus::Used, Some(at)) => format!("already used at {}", at.to_rfc3339()),
        (status, _) => format!("status: {}", status.as_str()),
    }
}

async fn owned_ticket(
    store: &dyn MarketplaceStore,
    seller: &Seller,
    qr_code: &str,
) -> AppResult<TicketLookup> {
    let ticket = store
        .find_ticket_by_qr(qr_code.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    if ticket.seller_id != seller.id {
        return Err(AppError::Forbidden(
            "This ticket belongs to another seller's event".to_string(),
        ));
    }
    Ok(ticket)
}

pub async fn lookup(
    store: &dyn MarketplaceStore,
    seller: &Seller,
    qr_code: &str,
) -> AppResult<ScanResult> {
    let ticket = owned_ticket(store, seller, qr_code).await?;
    Ok(ScanResult {
        ready: ticket.status == TicketStatus::Valid,
        verdict: verdict(&ticket),
        ticket,
    })
}

/// Admits the holder. Only a `valid` ticket can be checked in, and only once.
pub async fn check_in(
    store: &dyn MarketplaceStore,
    seller: &Seller,
    qr_code: &str,
    now: DateTime<Utc>,
) -> AppResult<Ticket> {
    let ticket = owned_ticket(store, seller, qr_code).await?;
    match store.check_in_ticket(ticket.id, now).await? {
        Some(checked_in) => {
            info!(ticket_id = %checked_in.id, event_id = %ticket.event_id, "Ticket checked in");
            Ok(checked_in)
        }
        None => {
            // Re-read so the message reflects a check-in that raced this one.
            let current = store
                .find_ticket_by_qr(&ticket.qr_code)
                .await?
                .unwrap_or(ticket);
            Err(AppError::Conflict(format!(
                "Ticket cannot be checked in ({})",
                verdict(&current)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::PaymentStatus;
    use crate::services::checkout::{checkout, CheckoutRequest};
    use crate::services::fixtures::{self, buyer, event, new_event, seller, ticket_type};
    use crate::services::payment::verify_payment;

    /// Buys one ticket, settles it, and returns the seller with its QR token.
    async fn issued_ticket(app: &fixtures::TestApp, settle: bool) -> (Seller, String) {
        let (_, seller) = seller(&app.store).await;
        let detail = event(&app.store, &seller, new_event("Show", "music", "Lagos", vec![ticket_type("A", 1000, 10)])).await;
        let user = buyer(&app.store).await;
        app.store.add_to_cart(user, detail.ticket_types[0].id, 1).await.unwrap();
        let response = checkout(&app.state, user, &CheckoutRequest::default())
            .await
            .unwrap();
        if settle {
            app.payments
                .mark(&response.payment_reference, PaymentStatus::Paid, None)
                .await;
            verify_payment(&app.state, &response.payment_reference)
                .await
                .unwrap();
        }
        let tickets = app.store.tickets_for_order(response.orders[0].id).await;
        (seller, tickets[0].qr_code.clone())
    }

    #[tokio::test]
    async fn test_check_in_is_single_use() {
        let app = fixtures::test_app();
        let (seller, qr) = issued_ticket(&app, true).await;

        let scan = lookup(app.store.as_ref(), &seller, &qr).await.unwrap();
        assert!(scan.ready);
        assert_eq!(scan.verdict, "ready");
        assert_eq!(scan.ticket.holder_name.as_deref(), Some("Ada Obi"));

        let ticket = check_in(app.store.as_ref(), &seller, &qr, Utc::now())
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Used);
        assert!(ticket.checked_in_at.is_some());

        let err = check_in(app.store.as_ref(), &seller, &qr, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let scan = lookup(app.store.as_ref(), &seller, &qr).await.unwrap();
        assert!(!scan.ready);
        assert!(scan.verdict.starts_with("already used at "));
    }

    #[tokio::test]
    async fn test_unpaid_ticket_cannot_be_checked_in() {
        let app = fixtures::test_app();
        let (seller, qr) = issued_ticket(&app, false).await;

        let scan = lookup(app.store.as_ref(), &seller, &qr).await.unwrap();
        assert_eq!(scan.verdict, "status: pending");
        let err = check_in(app.store.as_ref(), &seller, &qr, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_other_sellers_cannot_scan() {
        let app = fixtures::test_app();
        let (_, qr) = issued_ticket(&app, true).await;
        let (_, intruder) = seller(&app.store).await;

        let err = lookup(app.store.as_ref(), &intruder, &qr).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unknown_qr_is_not_found() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let err = lookup(app.store.as_ref(), &seller, "TIXHUB-0-NOPE").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
