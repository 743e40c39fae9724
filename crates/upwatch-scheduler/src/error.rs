//! Monitor error types.

use thiserror::Error;

use upwatch_core::ValidationError;
use upwatch_state::StateError;

/// Errors returned by [`Monitor`](crate::Monitor) operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid service definition: {0}")]
    Validation(#[from] ValidationError),

    #[error("service not found: {0}")]
    NotFound(String),

    #[error("state store error: {0}")]
    Storage(#[from] StateError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
