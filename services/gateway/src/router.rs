use crate::handlers::{account, market, order};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/orders", post(order::create_order))
        .route("/orders/{id}", get(order::get_order).delete(order::cancel_order))
        .route("/accounts/me", get(account::get_account))
        .route("/market-prices", get(market::list_market_prices))
        .route("/products", post(market::list_product));

    Router::new()
        .nest("/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
