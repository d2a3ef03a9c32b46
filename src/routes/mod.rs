use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{account, cart, events, health_check, purchase, seller};
use crate::state::AppState;

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(events::list_events))
        .route("/events/featured", get(events::featured_events))
        .route("/events/hot", get(events::hot_events))
        .route("/events/:id", get(events::event_detail))
        .route(
            "/events/:id/reviews",
            get(events::list_reviews).post(events::add_review),
        )
        .route("/events/:id/favorite", post(events::toggle_favorite))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/favorites", get(account::favorites))
        .route("/recommendations", get(account::recommendations))
        .route(
            "/cart",
            get(cart::view_cart)
                .post(cart::add_to_cart)
                .delete(cart::clear_cart),
        )
        .route(
            "/cart/:item_id",
            patch(cart::update_cart_item).delete(cart::remove_cart_item),
        )
        .route(
            "/profile",
            get(account::get_profile).put(account::update_profile),
        )
        .route(
            "/profile/preferences",
            get(account::get_preferences).put(account::update_preferences),
        )
}

fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/promo-codes/validate", post(purchase::validate_promo))
        .route("/checkout", post(purchase::checkout))
        .route("/payment/callback", get(purchase::payment_callback))
        .route("/my-tickets", get(purchase::my_tickets))
}

fn seller_routes() -> Router<AppState> {
    Router::new()
        .route("/seller/apply", post(seller::apply))
        .route("/seller/events", post(seller::create_event))
        .route(
            "/seller/promo-codes",
            get(seller::list_promo_codes).post(seller::create_promo_code),
        )
        .route("/seller/promo-codes/:id", delete(seller::delete_promo_code))
        .route("/seller/tickets/:qr", get(seller::lookup_ticket))
        .route("/seller/tickets/:qr/check-in", post(seller::check_in))
        .route("/seller/analytics", get(seller::seller_analytics))
}

pub fn create_routes(state: AppState) -> Router {
    let security_headers = create_security_headers_layer(&state.config);
    let cors = create_cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .merge(catalog_routes())
        .merge(user_routes())
        .merge(purchase_routes())
        .merge(seller_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers)
        .layer(cors)
}
