//! Persistence store for the tracker mappings.
//!
//! # Responsibility
//! - Own the progress and journal maps and their durable representation.
//! - Enforce day-range, journal-length and single-flight invariants.
//!
//! # Invariants
//! - Every mutation persists the *entire* affected mapping (no field-level
//!   update primitive exists at the backend).
//! - Malformed stored data is recovered as absent, never surfaced as a crash.

use crate::db::DbError;
use crate::model::day::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod backend;
pub mod tracker_store;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend, StorageError};
pub use tracker_store::{LoadState, TrackerStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by tracker store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Input rejected before any state change.
    Validation(ValidationError),
    /// Durable write rejected by the backend. The in-memory mapping may
    /// already hold the new value; see DESIGN.md for the rollback policy.
    Persistence(StorageError),
    /// A journal save was already in flight.
    SaveInFlight,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "persistence failure: {err}"),
            Self::SaveInFlight => write!(f, "a journal save is already in flight"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::SaveInFlight => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Persistence(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Persistence(StorageError::Db(value))
    }
}
