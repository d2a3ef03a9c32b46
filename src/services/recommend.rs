//! Personalised event suggestions.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Event, UserPreferences};
use crate::store::MarketplaceStore;
use crate::utils::AppResult;

pub const MAX_RECOMMENDATIONS: usize = 6;
pub const CANDIDATE_POOL: i64 = 20;

const CATEGORY_MATCH: i32 = 30;
const HOT: i32 = 20;
const FEATURED: i32 = 15;
const CITY_MATCH: i32 = 25;
const BESTSELLER: i32 = 10;
const ALREADY_ENGAGED: i32 = -100;
const BESTSELLER_THRESHOLD: i32 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub recommendations: Vec<Event>,
    pub reason: String,
}

pub fn score(event: &Event, prefs: &UserPreferences, excluded: &HashSet<Uuid>) -> i32 {
    let mut score = 0;
    if prefs
        .favorite_categories
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&event.category))
    {
        score += CATEGORY_MATCH;
    }
    if event.is_hot {
        score += HOT;
    }
    if event.is_featured {
        score += FEATURED;
    }
    if let Some(city) = &event.venue_city {
        if prefs
            .favorite_cities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(city))
        {
            score += CITY_MATCH;
        }
    }
    if event.sold_tickets > BESTSELLER_THRESHOLD {
        score += BESTSELLER;
    }
    if excluded.contains(&event.id) {
        score += ALREADY_ENGAGED;
    }
    score
}

/// Highest score first; `sort_by` is stable, so ties keep candidate order.
pub fn rank(candidates: Vec<Event>, prefs: &UserPreferences, excluded: &HashSet<Uuid>) -> Vec<Event> {
    let mut scored: Vec<(i32, Event)> = candidates
        .into_iter()
        .map(|event| (score(&event, prefs, excluded), event))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|(_, event)| event)
        .collect()
}

pub fn reason(prefs: &UserPreferences) -> String {
    if prefs.favorite_categories.is_empty() {
        return "Recommended for you".to_string();
    }
    let categories: Vec<&str> = prefs
        .favorite_categories
        .iter()
        .take(2)
        .map(String::as_str)
        .collect();
    format!("Based on your interest in {}", categories.join(", "))
}

async fn personalised(
    store: &dyn MarketplaceStore,
    user_id: Uuid,
    today: NaiveDate,
) -> AppResult<Recommendations> {
    let prefs = store.preferences(user_id).await?.unwrap_or_default();
    let mut excluded: HashSet<Uuid> = store.favorite_event_ids(user_id).await?.into_iter().collect();
    excluded.extend(store.purchased_event_ids(user_id).await?);

    let candidates = store.upcoming_events(today, CANDIDATE_POOL).await?;
    Ok(Recommendations {
        recommendations: rank(candidates, &prefs, &excluded),
        reason: reason(&prefs),
    })
}

async fn popular(store: &dyn MarketplaceStore) -> AppResult<Recommendations> {
    Ok(Recommendations {
        recommendations: store.popular_events(MAX_RECOMMENDATIONS as i64).await?,
        reason: "Popular events".to_string(),
    })
}

pub async fn recommend(
    store: &dyn MarketplaceStore,
    user_id: Option<Uuid>,
    today: NaiveDate,
) -> AppResult<Recommendations> {
    let Some(user_id) = user_id else {
        return popular(store).await;
    };
    match personalised(store, user_id, today).await {
        Ok(recommendations) => Ok(recommendations),
        Err(err) => {
            warn!(%user_id, error = %err, "Personalised recommendations failed, falling back to popular events");
            popular(store).await
        }
    }
}
