//! # campstore
//!
//! Storage and admission core of a camp registration service.
//!
//! ## Overview
//!
//! campstore provides the pieces a registration backend needs between its
//! HTTP surface and the disk:
//! - **Durable records**: every mutation is committed before it is reported
//! - **Concurrency safety**: uniqueness checks and id assignment are atomic
//! - **Validation**: form input is checked and sanitized before it is stored
//! - **Rate limiting**: a sliding window caps submissions per client
//!
//! ## Quick Start
//!
//! ```
//! use campstore::{Registry, Storage, validate};
//! use serde_json::json;
//!
//! let registry = Registry::new(Storage::Memory);
//!
//! let form = json!({
//!     "first_name": "Awa",
//!     "last_name": "Diop",
//!     "email": "Awa.Diop@Example.com",
//!     "phone": "+221 77 123 45 67",
//!     "age": 16,
//!     "grade": "seconde",
//!     "school": "Lycee Blaise Diagne",
//!     "city": "Dakar",
//!     "region": "Dakar",
//!     "district": "Plateau",
//!     "motivation": "I want to learn how proofs work."
//! });
//!
//! let fields = validate::validate_applicant(form.as_object().unwrap())?;
//! let record = registry.create("applicants", fields)?;
//!
//! assert_eq!(record.id, "STU0001");
//! assert_eq!(record.status, "pending");
//! assert_eq!(record.str_field("email"), Some("awa.diop@example.com"));
//! # Ok::<(), campstore::StoreError>(())
//! ```
//!
//! ## Persistence
//!
//! [`Storage::Files`] keeps each collection in `<dir>/<name>.json`, replaced
//! atomically on every commit. [`Storage::Memory`] keeps nothing across
//! restarts. Custom persistence implements [`Backend`].
//!
//! ```no_run
//! use campstore::{Registry, Storage};
//!
//! let registry = Registry::new(Storage::Files("./data".into()));
//! registry.open_all()?;
//! # Ok::<(), campstore::StoreError>(())
//! ```
//!
//! ## Rate Limiting
//!
//! ```
//! use campstore::SlidingWindowLimiter;
//! use std::time::Duration;
//!
//! // Ten submissions per client per minute
//! let limiter = SlidingWindowLimiter::new(10, Duration::from_secs(60));
//! assert!(limiter.allow("198.51.100.4"));
//! ```
//!
//! ## Thread Safety
//!
//! [`RecordStore`], [`Registry`] and [`SlidingWindowLimiter`] are `Send + Sync`
//! and are meant to be shared behind an `Arc`.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for the rate limiter's key map

pub mod core;

pub use core::{
    Backend, BackendError, CollectionSpec, DynRecordStore, ErrorKind, Fields, IdGenerator,
    JsonFileBackend, Loaded, MemoryBackend, Patch, RateLimitResult, Record, RecordStore,
    Registry, RegistryBuilder, Result, SlidingWindowLimiter, SlidingWindowLimiterBuilder, SortKey,
    SortOrder, Storage, StoreError, ValidationError,
};

pub use crate::core::validate;
