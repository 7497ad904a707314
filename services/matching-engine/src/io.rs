//! Bounded external calls

use std::future::Future;
use std::time::Duration;

use crate::errors::EngineError;

/// Await `call`, failing with [`EngineError::Timeout`] after `limit`
pub async fn bounded<T, E, F>(limit: Duration, operation: &'static str, call: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, E>>,
    EngineError: From<E>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(EngineError::from),
        Err(_) => Err(EngineError::Timeout {
            operation,
            after_ms: limit.as_millis() as u64,
        }),
    }
}
