use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::models::{Event, EventDetail, EventFilter, NewEvent, Seller};
use crate::store::{EventFlag, MarketplaceStore};
use crate::utils::{AppError, AppResult};

pub const RAIL_SIZE: i64 = 6;

fn matches_search(event: &Event, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [
        Some(event.title.as_str()),
        event.venue_name.as_deref(),
        event.venue_city.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Listed events filtered by category and city, then by a free-text search
/// over title, venue name and city.
pub async fn list(store: &dyn MarketplaceStore, filter: &EventFilter) -> AppResult<Vec<Event>> {
    let filter = EventFilter {
        category: filter.category.clone().filter(|c| !c.trim().is_empty() && c != "all"),
        city: filter.city.clone().filter(|c| !c.trim().is_empty()),
        search: filter.search.clone(),
    };
    let events = store.list_events(&filter).await?;
    Ok(match filter.search.as_deref().map(str::trim) {
        Some(needle) if !needle.is_empty() => events
            .into_iter()
            .filter(|e| matches_search(e, needle))
            .collect(),
        _ => events,
    })
}

pub async fn featured(store: &dyn MarketplaceStore) -> AppResult<Vec<Event>> {
    store.flagged_events(EventFlag::Featured, RAIL_SIZE).await
}

pub async fn hot(store: &dyn MarketplaceStore) -> AppResult<Vec<Event>> {
    store.flagged_events(EventFlag::Hot, RAIL_SIZE).await
}

pub async fn detail(store: &dyn MarketplaceStore, id: Uuid) -> AppResult<EventDetail> {
    let event = store
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {id} not found")))?;
    let ticket_types = store.ticket_types_for_event(id).await?;
    Ok(EventDetail {
        event,
        ticket_types,
    })
}

fn validate_new_event(event: &NewEvent) -> AppResult<()> {
    if event.title.trim().is_empty() {
        return Err(AppError::ValidationError("Event title is required".to_string()));
    }
    if event.category.trim().is_empty() {
        return Err(AppError::ValidationError("Event category is required".to_string()));
    }
    if event.ticket_types.is_empty() {
        return Err(AppError::ValidationError(
            "An event needs at least one ticket type".to_string(),
        ));
    }
    for ticket_type in &event.ticket_types {
        if ticket_type.name.trim().is_empty() {
            return Err(AppError::ValidationError("Ticket type name is required".to_string()));
        }
        if ticket_type.price < Decimal::ZERO {
            return Err(AppError::ValidationError(format!(
                "Price for {} cannot be negative",
                ticket_type.name
            )));
        }
        if ticket_type.quantity < 1 {
            return Err(AppError::ValidationError(format!(
                "Quantity for {} must be at least 1",
                ticket_type.name
            )));
        }
        if ticket_type.max_per_order.is_some_and(|max| max < 1) {
            return Err(AppError::ValidationError(format!(
                "Per-order limit for {} must be at least 1",
                ticket_type.name
            )));
        }
    }
    if let Some(venue) = &event.venue {
        if venue.name.trim().is_empty() || venue.city.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Venue name and city are required".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn create_event(
    store: &dyn MarketplaceStore,
    seller: &Seller,
    event: &NewEvent,
) -> AppResult<EventDetail> {
    validate_new_event(event)?;
    let created = store.create_event(seller.id, event).await?;
    info!(
        seller_id = %seller.id,
        event_id = %created.event.id,
        total_tickets = created.event.total_tickets,
        "Event created"
    );
    Ok(created)
}
