use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use matching_engine::EngineError;
use risk_engine::CheckError;
use serde_json::json;
use thiserror::Error;
use types::errors::WireError;
use types::ids::UserId;

/// Failures of the order intake path
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Rejected(#[from] CheckError),

    #[error("No wallet for user {0}")]
    UnknownUser(UserId),

    #[error("Product {0} is already listed")]
    DuplicateProduct(String),

    #[error("Dependency failed: {0}")]
    Dependency(#[from] EngineError),

    #[error("Could not encode event: {0}")]
    Encode(#[from] WireError),
}

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        let message = err.to_string();
        match err {
            IntakeError::Rejected(check) => match check {
                CheckError::InvalidParameter { .. } | CheckError::UnsupportedPair { .. } => {
                    AppError::BadRequest(message)
                }
                CheckError::InsufficientFunds { .. } => AppError::Unprocessable(message),
                CheckError::UnknownProduct(_) | CheckError::OrderNotFound(_) => AppError::NotFound(message),
                CheckError::NotOwner(_) => AppError::Forbidden(message),
                CheckError::AlreadySettled(_) => AppError::Conflict {
                    code: "ALREADY_SETTLED",
                    message,
                },
                CheckError::AlreadyClosed { .. } => AppError::Conflict {
                    code: "ALREADY_CLOSED",
                    message,
                },
            },
            IntakeError::UnknownUser(_) => AppError::NotFound(message),
            IntakeError::DuplicateProduct(_) => AppError::Conflict {
                code: "DUPLICATE_PRODUCT",
                message,
            },
            IntakeError::Dependency(e) if e.is_retryable() => AppError::ServiceUnavailable(message),
            IntakeError::Dependency(e) => AppError::InternalError(e.into()),
            IntakeError::Encode(e) => AppError::InternalError(e.into()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        IntakeError::Dependency(err).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN"),
            AppError::RateLimitExceeded(msg) => (StatusCode::TOO_MANY_REQUESTS, msg, "RATE_LIMIT_EXCEEDED"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, "INSUFFICIENT_FUNDS"),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, message, code),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, "SERVICE_UNAVAILABLE"),
            AppError::InternalError(e) => {
                tracing::error!(error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_engine::errors::StoreError;
    use rust_decimal::Decimal;

    fn status(err: IntakeError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_intake_errors_map_to_status() {
        assert_eq!(
            status(CheckError::InsufficientFunds {
                required: Decimal::from(2),
                available: Decimal::ONE
            }
            .into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(CheckError::UnknownProduct("x".into()).into()), StatusCode::NOT_FOUND);
        assert_eq!(status(CheckError::AlreadySettled("x".into()).into()), StatusCode::CONFLICT);
        assert_eq!(status(CheckError::NotOwner("x".into()).into()), StatusCode::FORBIDDEN);
        assert_eq!(
            status(
                CheckError::UnsupportedPair {
                    from: "USD".into(),
                    to: "JPY".into()
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(EngineError::Store(StoreError::Unavailable("down".into())).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(IntakeError::DuplicateProduct("Widget".into())),
            StatusCode::CONFLICT
        );
    }
}
