use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::services::cart::{self, AddToCart, UpdateQuantity};
use crate::state::AppState;
use crate::utils::response::{empty_success, success};
use crate::utils::AppResult;

pub async fn view_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Response> {
    let cart = cart::view(state.store.as_ref(), user_id).await?;
    Ok(success(cart, "Cart retrieved"))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<AddToCart>,
) -> AppResult<Response> {
    let cart = cart::add(state.store.as_ref(), user_id, &request).await?;
    Ok(success(cart, "Added to cart"))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateQuantity>,
) -> AppResult<Response> {
    let cart = cart::update(state.store.as_ref(), user_id, item_id, request.quantity).await?;
    Ok(success(cart, "Cart updated"))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Response> {
    let cart = cart::remove(state.store.as_ref(), user_id, item_id).await?;
    Ok(success(cart, "Item removed"))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Response> {
    cart::clear(state.store.as_ref(), user_id).await?;
    Ok(empty_success("Cart cleared"))
}
