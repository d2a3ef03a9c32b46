use tracing::info;
use uuid::Uuid;

use crate::models::{NewSeller, Profile, ProfileUpdate, Seller, TicketView, UserPreferences};
use crate::store::MarketplaceStore;
use crate::utils::{AppError, AppResult};

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn profile(store: &dyn MarketplaceStore, user_id: Uuid) -> AppResult<Profile> {
    store
        .profile(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

pub async fn update_profile(
    store: &dyn MarketplaceStore,
    user_id: Uuid,
    update: &ProfileUpdate,
) -> AppResult<Profile> {
    let update = ProfileUpdate {
        full_name: blank_to_none(&update.full_name),
        email: blank_to_none(&update.email),
        phone: blank_to_none(&update.phone),
    };
    if update.email.as_deref().is_some_and(|email| !email.contains('@')) {
        return Err(AppError::ValidationError("Email address is invalid".to_string()));
    }
    store.upsert_profile(user_id, &update).await
}

pub async fn preferences(store: &dyn MarketplaceStore, user_id: Uuid) -> AppResult<UserPreferences> {
    Ok(store.preferences(user_id).await?.unwrap_or_default())
}

pub async fn update_preferences(
    store: &dyn MarketplaceStore,
    user_id: Uuid,
    prefs: &UserPreferences,
) -> AppResult<UserPreferences> {
    let clean = |values: &[String]| -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
            if !out.iter().any(|o| o.eq_ignore_ascii_case(value)) {
                out.push(value.to_string());
            }
        }
        out
    };
    let prefs = UserPreferences {
        favorite_categories: clean(&prefs.favorite_categories),
        favorite_cities: clean(&prefs.favorite_cities),
    };
    store.upsert_preferences(user_id, &prefs).await
}

pub async fn my_tickets(store: &dyn MarketplaceStore, user_id: Uuid) -> AppResult<Vec<TicketView>> {
    store.tickets_for_user(user_id).await
}

pub async fn apply_as_seller(
    store: &dyn MarketplaceStore,
    user_id: Uuid,
    application: &NewSeller,
) -> AppResult<Seller> {
    if application.business_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Business name is required".to_string(),
        ));
    }
    if store.seller_for_user(user_id).await?.is_some() {
        return Err(AppError::Conflict(
            "This account is already a seller".to_string(),
        ));
    }
    let seller = store.create_seller(user_id, application).await?;
    info!(%user_id, seller_id = %seller.id, "Seller account created");
    Ok(seller)
}

/// The caller's seller account; seller-only operations fail without one.
pub async fn require_seller(store: &dyn MarketplaceStore, user_id: Uuid) -> AppResult<Seller> {
    store
        .seller_for_user(user_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("A seller account is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures;

    #[tokio::test]
    async fn test_seller_application_is_one_time() {
        let app = fixtures::test_app();
        let user = Uuid::new_v4();
        let application = NewSeller {
            business_name: "Eko Events".to_string(),
            business_email: None,
        };

        assert!(matches!(
            require_seller(app.store.as_ref(), user).await,
            Err(AppError::Forbidden(_))
        ));
        let seller = apply_as_seller(app.store.as_ref(), user, &application).await.unwrap();
        assert_eq!(require_seller(app.store.as_ref(), user).await.unwrap().id, seller.id);
        assert!(matches!(
            apply_as_seller(app.store.as_ref(), user, &application).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_preferences_default_and_dedupe() {
        let app = fixtures::test_app();
        let user = Uuid::new_v4();
        let empty = preferences(app.store.as_ref(), user).await.unwrap();
        assert!(empty.favorite_categories.is_empty());

        let saved = update_preferences(
            app.store.as_ref(),
            user,
            &UserPreferences {
                favorite_categories: vec!["music".into(), " Music ".into(), "".into()],
                favorite_cities: vec!["Lagos".into()],
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.favorite_categories, vec!["music".to_string()]);
    }

    #[tokio::test]
    async fn test_profile_update_validates_email() {
        let app = fixtures::test_app();
        let user = Uuid::new_v4();
        let bad = ProfileUpdate {
            full_name: None,
            email: Some("not-an-email".to_string()),
            phone: None,
        };
        assert!(update_profile(app.store.as_ref(), user, &bad).await.is_err());

        let good = ProfileUpdate {
            full_name: Some("Tolu".to_string()),
            email: Some("tolu@example.com".to_string()),
            phone: Some("  ".to_string()),
        };
        let saved = update_profile(app.store.as_ref(), user, &good).await.unwrap();
        assert_eq!(saved.email.as_deref(), Some("tolu@example.com"));
        assert!(saved.phone.is_none());
    }
}
