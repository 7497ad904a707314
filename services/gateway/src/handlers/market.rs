use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::rate_limit::{ORDER_PLACEMENT, QUERY};
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use risk_engine::ListingRequest;
use types::market::{Product, ProductQuote};

/// Every listed product with its base and current price
pub async fn list_market_prices(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ProductQuote>>, AppError> {
    state
        .rate_limiter
        .check_rate_limit(&format!("{}:market_query", user.user_id), QUERY)?;

    Ok(Json(state.prices.quotes().await?))
}

pub async fn list_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<ListingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    state
        .rate_limiter
        .check_rate_limit(&format!("{}:product_listing", user.user_id), ORDER_PLACEMENT)?;
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let product = state.intake.list_product(user.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}
