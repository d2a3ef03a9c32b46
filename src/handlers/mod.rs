use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::state::AppState;
use crate::utils::response::success;

pub mod account;
pub mod auth;
pub mod cart;
pub mod events;
pub mod purchase;
pub mod seller;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
    store: &'static str,
    payments: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "tixhub-api",
        store: state.store.backend_tag(),
        payments: state.payments.provider(),
    };

    success(payload, "Health check successful")
}
