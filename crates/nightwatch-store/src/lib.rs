//! Persistence layer for nightwatch
//!
//! Provides:
//! - Devices and their one-to-one policies
//! - Append-only device event log (also the heartbeat source)
//! - Extra-time ledger rows with atomic clamp-then-write primitives
//! - Parent session lookup for the parent surface

mod records;
mod sqlite;
mod traits;

pub use records::*;
pub use sqlite::*;
pub use traits::*;

use nightwatch_util::NightwatchError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for NightwatchError {
    fn from(e: StoreError) -> Self {
        NightwatchError::store(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
