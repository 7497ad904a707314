use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::OrderResponse;
use crate::rate_limit::{ORDER_CANCEL, ORDER_PLACEMENT, QUERY};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use risk_engine::OrderRequest;
use types::ids::OrderId;
use types::order::Order;

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    state
        .rate_limiter
        .check_rate_limit(&format!("{}:order_placement", user.user_id), ORDER_PLACEMENT)?;
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let order = state.intake.submit(user.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// Accepted, not done: the engine cancels and refunds asynchronously
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    state
        .rate_limiter
        .check_rate_limit(&format!("{}:order_cancel", user.user_id), ORDER_CANCEL)?;

    let order = state
        .intake
        .cancel(user.user_id, &OrderId::from_string(order_id))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(OrderResponse::from(&order))))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    state
        .rate_limiter
        .check_rate_limit(&format!("{}:order_query", user.user_id), QUERY)?;

    let order = state
        .intake
        .order(user.user_id, &OrderId::from_string(order_id))
        .await?;
    Ok(Json(order))
}
