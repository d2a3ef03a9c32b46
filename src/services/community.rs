//! Favorites and reviews.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NewReview, Review};
use crate::store::MarketplaceStore;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteState {
    pub event_id: Uuid,
    pub favorited: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub reviews: Vec<Review>,
    pub average_rating: Option<Decimal>,
    pub total: usize,
}

async fn ensure_event(store: &dyn MarketplaceStore, event_id: Uuid) -> AppResult<()> {
    store
        .get_event(event_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))
}

pub async fn toggle_favorite(
    store: &dyn MarketplaceStore,
    user_id: Uuid,
    event_id: Uuid,
) -> AppResult<FavoriteState> {
    ensure_event(store, event_id).await?;
    let favorited = store.toggle_favorite(user_id, event_id).await?;
    Ok(FavoriteState {
        event_id,
        favorited,
    })
}

/// Mean rating rounded to one decimal place.
pub fn average_rating(reviews: &[Review]) -> Option<Decimal> {
    if reviews.is_empty() {
        return None;
    }
    let sum: Decimal = reviews.iter().map(|r| Decimal::from(r.rating)).sum();
    Some((sum / Decimal::from(reviews.len())).round_dp(1))
}

pub async fn reviews(store: &dyn MarketplaceStore, event_id: Uuid) -> AppResult<ReviewSummary> {
    ensure_event(store, event_id).await?;
    let reviews = store.reviews_for_event(event_id).await?;
    Ok(ReviewSummary {
        average_rating: average_rating(&reviews),
        total: reviews.len(),
        reviews,
    })
}

pub async fn add_review(
    store: &dyn MarketplaceStore,
    user_id: Uuid,
    event_id: Uuid,
    review: &NewReview,
) -> AppResult<Review> {
    if !(1..=5).contains(&review.rating) {
        return Err(AppError::ValidationError(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    ensure_event(store, event_id).await?;
    store.add_review(user_id, event_id, review).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::{self, event, new_event, seller, ticket_type};

    fn stars(rating: i16) -> NewReview {
        NewReview {
            rating,
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_favorite_toggles() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let detail = event(&app.store, &seller, new_event("Show", "music", "Lagos", vec![ticket_type("A", 100, 10)])).await;
        let user = Uuid::new_v4();

        assert!(toggle_favorite(app.store.as_ref(), user, detail.event.id).await.unwrap().favorited);
        assert_eq!(app.store.favorite_event_ids(user).await.unwrap(), vec![detail.event.id]);
        assert!(!toggle_favorite(app.store.as_ref(), user, detail.event.id).await.unwrap().favorited);
        assert!(app.store.favorite_event_ids(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reviews_average_and_single_review_per_user() {
        let app = fixtures::test_app();
        let (_, seller) = seller(&app.store).await;
        let detail = event(&app.store, &seller, new_event("Show", "music", "Lagos", vec![ticket_type("A", 100, 10)])).await;
        let id = detail.event.id;
        let first = Uuid::new_v4();

        add_review(app.store.as_ref(), first, id, &stars(5)).await.unwrap();
        add_review(app.store.as_ref(), Uuid::new_v4(), id, &stars(4)).await.unwrap();
        add_review(app.store.as_ref(), Uuid::new_v4(), id, &stars(4)).await.unwrap();

        let summary = reviews(app.store.as_ref(), id).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.average_rating, Some(Decimal::new(43, 1)));

        let err = add_review(app.store.as_ref(), first, id, &stars(3)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rating_out_of_range() {
        let app = fixtures::test_app();
        let err = add_review(app.store.as_ref(), Uuid::new_v4(), Uuid::new_v4(), &stars(6))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
