use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::AccountResponse;
use crate::rate_limit::QUERY;
use crate::state::AppState;
use axum::{Json, extract::State};

pub async fn get_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<AccountResponse>, AppError> {
    state
        .rate_limiter
        .check_rate_limit(&format!("{}:account_query", user.user_id), QUERY)?;

    let account = state.intake.account(user.user_id).await?;
    Ok(Json(account))
}
