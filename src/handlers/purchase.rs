use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::services::checkout::{self, CheckoutRequest};
use crate::services::{account, payment, promo};
use crate::state::AppState;
use crate::utils::response::{created, success};
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct ValidatePromo {
    pub code: String,
    pub event_id: Option<Uuid>,
    pub subtotal: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub payment_reference: String,
}

pub async fn validate_promo(
    State(state): State<AppState>,
    Json(request): Json<ValidatePromo>,
) -> AppResult<Response> {
    let applied = promo::validate(
        state.store.as_ref(),
        &request.code,
        request.event_id,
        request.subtotal,
    )
    .await?;
    Ok(success(applied, "Promo code applied"))
}

pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Response> {
    let response = checkout::checkout(&state, user_id, &request).await?;
    let message = match response.status {
        checkout::CheckoutStatus::Pending => "Orders created, complete payment to receive tickets",
        checkout::CheckoutStatus::Completed => "Orders completed",
    };
    Ok(created(response, message))
}

pub async fn payment_callback(
    State(state): State<AppState>,
    Query(callback): Query<PaymentCallback>,
) -> AppResult<Response> {
    let outcome = payment::verify_payment(&state, &callback.payment_reference).await?;
    let message = if outcome.paid {
        "Payment confirmed"
    } else {
        "Payment not completed"
    };
    Ok(success(outcome, message))
}

pub async fn my_tickets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Response> {
    let tickets = account::my_tickets(state.store.as_ref(), user_id).await?;
    Ok(success(tickets, "Tickets retrieved"))
}
