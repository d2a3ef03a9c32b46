use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Cart, EventStatus, TicketType};
use crate::store::MarketplaceStore;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub ticket_type_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

pub async fn view(store: &dyn MarketplaceStore, user_id: Uuid) -> AppResult<Cart> {
    Ok(Cart::new(store.cart_items(user_id).await?))
}

fn check_limits(ticket_type: &TicketType, quantity: i32) -> AppResult<()> {
    if let Some(max) = ticket_type.max_per_order {
        if quantity > max {
            return Err(AppError::ValidationError(format!(
                "You can buy at most {max} {} tickets per order",
                ticket_type.name
            )));
        }
    }
    if quantity > ticket_type.remaining() {
        return Err(AppError::Conflict(format!(
            "Only {} {} tickets left",
            ticket_type.remaining(),
            ticket_type.name
        )));
    }
    Ok(())
}

pub async fn add(store: &dyn MarketplaceStore, user_id: Uuid, request: &AddToCart) -> AppResult<Cart> {
    if request.quantity < 1 {
        return Err(AppError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }
    let ticket_type = store
        .get_ticket_type(request.ticket_type_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Ticket type {} not found", request.ticket_type_id))
        })?;
    let event = store
        .get_event(ticket_type.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", ticket_type.event_id)))?;
    if event.status != EventStatus::Active {
        return Err(AppError::Conflict(format!("{} is not on sale", event.title)));
    }

    let already = store
        .cart_items(user_id)
        .await?
        .iter()
        .find(|item| item.ticket_type_id == ticket_type.id)
        .map_or(0, |item| item.quantity);
    let total = already.checked_add(request.quantity).ok_or_else(|| {
        AppError::Conflict(format!(
            "Only {} {} tickets left",
            ticket_type.remaining(),
            ticket_type.name
        ))
    })?;
    check_limits(&ticket_type, total)?;

    store
        .add_to_cart(user_id, ticket_type.id, request.quantity)
        .await?;
    view(store, user_id).await
}

/// Sets a line's quantity; zero or less removes the line.
pub async fn update(
    store: &dyn MarketplaceStore,
    user_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> AppResult<Cart> {
    let items = store.cart_items(user_id).await?;
    let item = items
        .iter()
        .find(|item| item.id == item_id)
        .ok_or_else(|| AppError::NotFound(format!("Cart item {item_id} not found")))?;

    if quantity <= 0 {
        store.remove_cart_item(user_id, item_id).await?;
        return view(store, user_id).await;
    }

    let ticket_type = store
        .get_ticket_type(item.ticket_type_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket type {} not found", item.ticket_type_id)))?;
    check_limits(&ticket_type, quantity)?;

    store.set_cart_quantity(user_id, item_id, quantity).await?;
    view(store, user_id).await
}

pub async fn remove(store: &dyn MarketplaceStore, user_id: Uuid, item_id: Uuid) -> AppResult<Cart> {
    if !store.remove_cart_item(user_id, item_id).await? {
        return Err(AppError::NotFound(format!("Cart item {item_id} not found")));
    }
    view(store, user_id).await
}

pub async fn clear(store: &dyn MarketplaceStore, user_id: Uuid) -> AppResult<()> {
    store.clear_cart(user_id).await
}
