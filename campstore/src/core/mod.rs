//! Core components of the campstore library
//!
//! This module contains the fundamental building blocks:
//! - [`record`]: Record, patch and collection description types
//! - [`id`]: Identifier generation for new records
//! - [`validate`]: Form validation and sanitization
//! - [`store`]: The durable record store and its persistence backends
//! - [`registry`]: Collection-name addressed access to record stores
//! - [`rate_limiter`]: Sliding-window admission control

pub mod id;
pub mod rate_limiter;
pub mod record;
pub mod registry;
pub mod store;
pub mod validate;

pub use id::IdGenerator;
pub use rate_limiter::{RateLimitResult, SlidingWindowLimiter, SlidingWindowLimiterBuilder};
pub use record::{CollectionSpec, Fields, Patch, Record, SortKey, SortOrder};
pub use registry::{Registry, RegistryBuilder, Storage};
pub use store::{
    Backend, BackendError, DynRecordStore, JsonFileBackend, Loaded, MemoryBackend, RecordStore,
};
pub use validate::ValidationError;

use thiserror::Error;

/// Result type used by the store and registry
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by record store operations
///
/// Every variant maps to exactly one [`ErrorKind`], which callers use to
/// pick a stable status code or message.
///
/// # Example
///
/// ```
/// use campstore::{CollectionSpec, MemoryBackend, RecordStore, StoreError};
///
/// let store = RecordStore::open(CollectionSpec::applicants(), MemoryBackend::new()).unwrap();
///
/// match store.get("STU9999") {
///     Err(StoreError::NotFound { id, .. }) => assert_eq!(id, "STU9999"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum StoreError {
    /// The submitted fields failed validation or lack a required identity field
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    /// A uniqueness constraint would be violated
    #[error("duplicate {field} `{value}` in collection `{collection}`")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },
    /// No record with the given id exists
    #[error("record `{id}` not found in collection `{collection}`")]
    NotFound { collection: String, id: String },
    /// The patch asks for a status or field change the collection does not allow
    #[error("invalid transition for record `{id}`: {reason}")]
    InvalidTransition { id: String, reason: String },
    /// The new state could not be made durable
    ///
    /// In-memory state matches the backend: rolled back when the write did
    /// not happen, kept when it happened but could not be flushed.
    #[error("failed to persist collection `{collection}`: {source}")]
    Persistence {
        collection: String,
        #[source]
        source: BackendError,
    },
    /// The registry has no collection with this name
    #[error("unknown collection `{0}`")]
    UnknownCollection(String),
}

/// Stable classification of [`StoreError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    DuplicateKey,
    NotFound,
    InvalidTransition,
    Persistence,
    UnknownCollection,
}

impl ErrorKind {
    /// Snake-case identifier suitable for API responses
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Persistence => "persistence_failure",
            ErrorKind::UnknownCollection => "unknown_collection",
        }
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            StoreError::Persistence { .. } => ErrorKind::Persistence,
            StoreError::UnknownCollection(_) => ErrorKind::UnknownCollection,
        }
    }
}
