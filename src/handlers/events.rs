use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::models::{EventFilter, NewReview};
use crate::services::{catalog, community};
use crate::state::AppState;
use crate::utils::response::{created, success};
use crate::utils::AppResult;

pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> AppResult<Response> {
    let events = catalog::list(state.store.as_ref(), &filter).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn featured_events(State(state): State<AppState>) -> AppResult<Response> {
    let events = catalog::featured(state.store.as_ref()).await?;
    Ok(success(events, "Featured events retrieved"))
}

pub async fn hot_events(State(state): State<AppState>) -> AppResult<Response> {
    let events = catalog::hot(state.store.as_ref()).await?;
    Ok(success(events, "Hot events retrieved"))
}

pub async fn event_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let detail = catalog::detail(state.store.as_ref(), id).await?;
    Ok(success(detail, "Event retrieved"))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let summary = community::reviews(state.store.as_ref(), id).await?;
    Ok(success(summary, "Reviews retrieved"))
}

pub async fn add_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(review): Json<NewReview>,
) -> AppResult<Response> {
    let review = community::add_review(state.store.as_ref(), user_id, id, &review).await?;
    Ok(created(review, "Review added"))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let favorite = community::toggle_favorite(state.store.as_ref(), user_id, id).await?;
    let message = if favorite.favorited {
        "Added to favorites"
    } else {
        "Removed from favorites"
    };
    Ok(success(favorite, message))
}
