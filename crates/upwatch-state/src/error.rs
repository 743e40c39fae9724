//! Errors raised by the redb-backed service and history store.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// A failed store operation. Each variant carries the redb or serde message.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open store: {0}")]
    Open(String),

    #[error("store transaction failed: {0}")]
    Transaction(String),

    #[error("failed to open table: {0}")]
    Table(String),

    #[error("failed to read record: {0}")]
    Read(String),

    #[error("failed to write record: {0}")]
    Write(String),

    #[error("failed to encode record: {0}")]
    Serialize(String),

    #[error("failed to decode record: {0}")]
    Deserialize(String),
}
