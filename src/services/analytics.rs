use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Event, EventStatus, Order, Seller};
use crate::store::MarketplaceStore;
use crate::utils::AppResult;

pub const SALES_WINDOW_DAYS: i64 = 7;
pub const TOP_EVENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub orders: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRevenue {
    pub event_id: Uuid,
    pub title: String,
    pub revenue: Decimal,
    pub tickets_sold: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerAnalytics {
    pub total_revenue: Decimal,
    pub total_tickets_sold: i64,
    pub total_events: usize,
    pub active_events: usize,
    pub sales_by_day: Vec<DailySales>,
    pub revenue_by_category: Vec<CategoryRevenue>,
    pub top_events: Vec<EventRevenue>,
}

/// Aggregates a seller's events and their completed orders as of `today`.
pub fn summarize(events: &[Event], orders: &[Order], today: NaiveDate) -> SellerAnalytics {
    let revenue_of = |event_id: Uuid| -> Decimal {
        orders
            .iter()
            .filter(|o| o.event_id == event_id)
            .map(|o| o.total_amount)
            .sum()
    };

    let sales_by_day = (0..SALES_WINDOW_DAYS)
        .rev()
        .map(|days_ago| {
            let date = today - Duration::days(days_ago);
            let day: Vec<&Order> = orders
                .iter()
                .filter(|o| o.created_at.date_naive() == date)
                .collect();
            DailySales {
                date,
                revenue: day.iter().map(|o| o.total_amount).sum(),
                orders: day.len() as u32,
            }
        })
        .collect();

    let mut by_category: HashMap<&str, Decimal> = HashMap::new();
    for event in events {
        *by_category.entry(event.category.as_str()).or_default() += revenue_of(event.id);
    }
    let mut revenue_by_category: Vec<CategoryRevenue> = by_category
        .into_iter()
        .map(|(category, revenue)| CategoryRevenue {
            category: category.to_string(),
            revenue,
        })
        .collect();
    revenue_by_category.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.category.cmp(&b.category)));

    let mut top_events: Vec<EventRevenue> = events
        .iter()
        .map(|event| EventRevenue {
            event_id: event.id,
            title: event.title.clone(),
            revenue: revenue_of(event.id),
            tickets_sold: event.sold_tickets,
        })
        .collect();
    top_events.sort_by(|a, b| b.revenue.cmp(&a.revenue));
    top_events.truncate(TOP_EVENTS);

    SellerAnalytics {
        total_revenue: orders.iter().map(|o| o.total_amount).sum(),
        total_tickets_sold: events.iter().map(|e| i64::from(e.sold_tickets)).sum(),
        total_events: events.len(),
        active_events: events
            .iter()
            .filter(|e| e.status == EventStatus::Active)
            .count(),
        sales_by_day,
        revenue_by_category,
        top_events,
    }
}

pub async fn for_seller(
    store: &dyn MarketplaceStore,
    seller: &Seller,
    today: NaiveDate,
) -> AppResult<SellerAnalytics> {
    let events = store.events_for_seller(seller.id).await?;
    let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
    let orders = if event_ids.is_empty() {
        Vec::new()
    } else {
        store.completed_orders_for_events(&event_ids).await?
    };
    Ok(summarize(&events, &orders, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use chrono::{NaiveTime, Utc};

    fn event(title: &str, category: &str, sold: i32, status: EventStatus) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            venue_id: None,
            title: title.to_string(),
            description: None,
            category: category.to_string(),
            date: now.date_naive(),
            start_time: NaiveTime::MIN,
            end_time: None,
            tags: Vec::new(),
            cover_image: None,
            is_featured: false,
            is_hot: false,
            total_tickets: 100,
            sold_tickets: sold,
            status,
            venue_name: None,
            venue_city: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn order(event_id: Uuid, total: i64, days_ago: i64) -> Order {
        let at = Utc::now() - Duration::days(days_ago);
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            event_id,
            status: OrderStatus::Completed,
            subtotal: Decimal::from(total),
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::from(total),
            promo_code_id: None,
            payment_reference: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_summary_totals_and_breakdowns() {
        let concert = event("Concert", "music", 40, EventStatus::Active);
        let standup = event("Standup", "comedy", 10, EventStatus::SoldOut);
        let orders = vec![
            order(concert.id, 5000, 0),
            order(concert.id, 3000, 1),
            order(standup.id, 2000, 0),
            order(standup.id, 1000, 10),
        ];
        let today = Utc::now().date_naive();

        let summary = summarize(&[concert.clone(), standup.clone()], &orders, today);

        assert_eq!(summary.total_revenue, Decimal::from(11000));
        assert_eq!(summary.total_tickets_sold, 50);
        assert_eq!(summary.total_events, 2);
        assert_eq!(summary.active_events, 1);

        assert_eq!(summary.sales_by_day.len(), 7);
        let last = summary.sales_by_day.last().unwrap();
        assert_eq!(last.date, today);
        assert_eq!(last.revenue, Decimal::from(7000));
        assert_eq!(last.orders, 2);

        assert_eq!(summary.revenue_by_category[0].category, "music");
        assert_eq!(summary.revenue_by_category[0].revenue, Decimal::from(8000));
        assert_eq!(summary.top_events[0].event_id, concert.id);
        assert_eq!(summary.top_events[1].revenue, Decimal::from(3000));
    }

    #[test]
    fn test_top_events_capped() {
        let events: Vec<Event> = (0..8)
            .map(|i| event(&format!("E{i}"), "tech", i, EventStatus::Active))
            .collect();
        let summary = summarize(&events, &[], Utc::now().date_naive());
        assert_eq!(summary.top_events.len(), TOP_EVENTS);
        assert_eq!(summary.total_revenue, Decimal::ZERO);
    }
}
