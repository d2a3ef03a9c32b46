use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::Utc;

use super::auth::{AuthUser, MaybeUser};
use crate::models::{ProfileUpdate, UserPreferences};
use crate::services::{account, recommend};
use crate::state::AppState;
use crate::utils::response::success;
use crate::utils::AppResult;

pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Response> {
    let profile = account::profile(state.store.as_ref(), user_id).await?;
    Ok(success(profile, "Profile retrieved"))
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Response> {
    let profile = account::update_profile(state.store.as_ref(), user_id, &update).await?;
    Ok(success(profile, "Profile updated"))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Response> {
    let prefs = account::preferences(state.store.as_ref(), user_id).await?;
    Ok(success(prefs, "Preferences retrieved"))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(prefs): Json<UserPreferences>,
) -> AppResult<Response> {
    let prefs = account::update_preferences(state.store.as_ref(), user_id, &prefs).await?;
    Ok(success(prefs, "Preferences updated"))
}

pub async fn favorites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Response> {
    let ids = state.store.favorite_event_ids(user_id).await?;
    Ok(success(ids, "Favorites retrieved"))
}

pub async fn recommendations(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
) -> AppResult<Response> {
    let result =
        recommend::recommend(state.store.as_ref(), user_id, Utc::now().date_naive()).await?;
    Ok(success(result, "Recommendations retrieved"))
}
