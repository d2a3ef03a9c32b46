//! Promo code evaluation and seller management of codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{AppliedPromo, DiscountType, NewPromoCode, PromoCode, Seller};
use crate::store::MarketplaceStore;
use crate::utils::{random_code, AppError, AppResult};

pub const GENERATED_CODE_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PromoRejection {
    #[error("This promo code is not valid for this purchase")]
    NotFound,

    #[error("This promo code has expired")]
    Expired,

    #[error("This promo code has reached its usage limit")]
    Exhausted,

    #[error("Minimum purchase of {0} required")]
    BelowMinimum(Decimal),
}

impl PromoRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            PromoRejection::NotFound => "PROMO_NOT_FOUND",
            PromoRejection::Expired => "PROMO_EXPIRED",
            PromoRejection::Exhausted => "PROMO_EXHAUSTED",
            PromoRejection::BelowMinimum(_) => "PROMO_MINIMUM_NOT_MET",
        }
    }
}

impl From<PromoRejection> for AppError {
    fn from(rejection: PromoRejection) -> Self {
        AppError::Rejected {
            reason: rejection.reason(),
            message: rejection.to_string(),
        }
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Picks the code that applies to a purchase touching `event_ids`: a code
/// scoped to one of those events wins over a global one.
pub fn select_candidate<'a>(candidates: &'a [PromoCode], event_ids: &[Uuid]) -> Option<&'a PromoCode> {
    event_ids
        .iter()
        .find_map(|event_id| candidates.iter().find(|p| p.event_id == Some(*event_id)))
        .or_else(|| candidates.iter().find(|p| p.event_id.is_none()))
}

pub fn discount_for(promo: &PromoCode, subtotal: Decimal) -> Decimal {
    match promo.discount_type {
        DiscountType::Percentage => subtotal * promo.discount_value / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => promo.discount_value.min(subtotal),
    }
}

/// Checks expiry, usage cap and minimum purchase, returning the discount.
pub fn evaluate(
    promo: &PromoCode,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, PromoRejection> {
    if promo.expires_at.is_some_and(|expires_at| expires_at < now) {
        return Err(PromoRejection::Expired);
    }
    if promo.max_uses.is_some_and(|max| promo.used_count >= max) {
        return Err(PromoRejection::Exhausted);
    }
    if let Some(min) = promo.min_purchase {
        if subtotal < min {
            return Err(PromoRejection::BelowMinimum(min));
        }
    }
    Ok(discount_for(promo, subtotal))
}

pub fn applied(promo: &PromoCode, amount: Decimal) -> AppliedPromo {
    AppliedPromo {
        id: promo.id,
        code: promo.code.clone(),
        discount_type: promo.discount_type,
        event_id: promo.event_id,
        amount,
    }
}

/// Discount preview for a single event (or a cart-wide purchase when `event_id` is `None`).
pub async fn validate(
    store: &dyn MarketplaceStore,
    code: &str,
    event_id: Option<Uuid>,
    subtotal: Decimal,
) -> AppResult<AppliedPromo> {
    if subtotal < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Subtotal cannot be negative".to_string(),
        ));
    }
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(AppError::ValidationError("Promo code is required".to_string()));
    }

    let candidates = store.active_promo_codes(&code).await?;
    let event_ids: Vec<Uuid> = event_id.into_iter().collect();
    let promo = select_candidate(&candidates, &event_ids).ok_or(PromoRejection::NotFound)?;
    let amount = evaluate(promo, subtotal, Utc::now())?;
    Ok(applied(promo, amount))
}

fn validate_new(promo: &NewPromoCode) -> AppResult<()> {
    match promo.discount_type {
        DiscountType::Percentage
            if promo.discount_value <= Decimal::ZERO
                || promo.discount_value > Decimal::ONE_HUNDRED =>
        {
            return Err(AppError::ValidationError(
                "Percentage discounts must be greater than 0 and at most 100".to_string(),
            ));
        }
        DiscountType::Fixed if promo.discount_value <= Decimal::ZERO => {
            return Err(AppError::ValidationError(
                "Fixed discounts must be greater than 0".to_string(),
            ));
        }
        _ => {}
    }
    if promo.max_uses.is_some_and(|max| max < 1) {
        return Err(AppError::ValidationError(
            "Maximum uses must be at least 1".to_string(),
        ));
    }
    if promo.min_purchase.is_some_and(|min| min < Decimal::ZERO) {
        return Err(AppError::ValidationError(
            "Minimum purchase cannot be negative".to_string(),
        ));
    }
    Ok(())
}

pub async fn create(
    store: &dyn MarketplaceStore,
    seller: &Seller,
    promo: &NewPromoCode,
) -> AppResult<PromoCode> {
    validate_new(promo)?;

    if let Some(event_id) = promo.event_id {
        let event = store
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;
        if event.seller_id != seller.id {
            return Err(AppError::Forbidden(
                "Promo codes can only be scoped to your own events".to_string(),
            ));
        }
    }

    let code = match promo.code.as_deref().map(normalize_code) {
        Some(code) if !code.is_empty() => code,
        _ => random_code(GENERATED_CODE_LENGTH),
    };

    let created = store.create_promo_code(seller.id, &code, promo).await?;
    info!(seller_id = %seller.id, code = %created.code, "Promo code created");
    Ok(created)
}

pub async fn list(store: &dyn MarketplaceStore, seller: &Seller) -> AppResult<Vec<PromoCode>> {
    store.promo_codes_for_seller(seller.id).await
}

pub async fn delete(store: &dyn MarketplaceStore, seller: &Seller, id: Uuid) -> AppResult<()> {
    if !store.delete_promo_code(seller.id, id).await? {
        return Err(AppError::NotFound(format!("Promo code {id} not found")));
    }
    Ok(())
}
