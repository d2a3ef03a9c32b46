use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use super::auth::{AuthUser, SellerUser};
use crate::models::{NewEvent, NewPromoCode, NewSeller};
use crate::services::{account, analytics, catalog, checkin, promo};
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};
use crate::utils::AppResult;

pub async fn apply(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(application): Json<NewSeller>,
) -> AppResult<Response> {
    let seller = account::apply_as_seller(state.store.as_ref(), user_id, &application).await?;
    Ok(created(seller, "Seller account created"))
}

pub async fn create_event(
    State(state): State<AppState>,
    SellerUser(seller): SellerUser,
    Json(event): Json<NewEvent>,
) -> AppResult<Response> {
    let detail = catalog::create_event(state.store.as_ref(), &seller, &event).await?;
    Ok(created(detail, "Event created"))
}

pub async fn list_promo_codes(
    State(state): State<AppState>,
    SellerUser(seller): SellerUser,
) -> AppResult<Response> {
    let codes = promo::list(state.store.as_ref(), &seller).await?;
    Ok(success(codes, "Promo codes retrieved"))
}

pub async fn create_promo_code(
    State(state): State<AppState>,
    SellerUser(seller): SellerUser,
    Json(new_code): Json<NewPromoCode>,
) -> AppResult<Response> {
    let code = promo::create(state.store.as_ref(), &seller, &new_code).await?;
    Ok(created(code, "Promo code created"))
}

pub async fn delete_promo_code(
    State(state): State<AppState>,
    SellerUser(seller): SellerUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    promo::delete(state.store.as_ref(), &seller, id).await?;
    Ok(empty_success("Promo code deleted"))
}

pub async fn lookup_ticket(
    State(state): State<AppState>,
    SellerUser(seller): SellerUser,
    Path(qr_code): Path<String>,
) -> AppResult<Response> {
    let scan = checkin::lookup(state.store.as_ref(), &seller, &qr_code).await?;
    Ok(success(scan, "Ticket found"))
}

pub async fn check_in(
    State(state): State<AppState>,
    SellerUser(seller): SellerUser,
    Path(qr_code): Path<String>,
) -> AppResult<Response> {
    let ticket = checkin::check_in(state.store.as_ref(), &seller, &qr_code, Utc::now()).await?;
    Ok(success(ticket, "Ticket checked in"))
}

pub async fn seller_analytics(
    State(state): State<AppState>,
    SellerUser(seller): SellerUser,
) -> AppResult<Response> {
    let summary =
        analytics::for_seller(state.store.as_ref(), &seller, Utc::now().date_naive()).await?;
    Ok(success(summary, "Analytics retrieved"))
}
