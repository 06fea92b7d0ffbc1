//! Durable, concurrency-safe record store
//!
//! A [`RecordStore`] keeps one collection in memory and writes the whole
//! collection through its [`Backend`] on every mutation, before the
//! mutation is reported as successful.
//!
//! # Locking
//!
//! Each store owns a single `RwLock`. Mutations hold the write guard for
//! the complete check → mutate → persist sequence, so uniqueness checks,
//! identifier assignment and persistence are atomic with respect to other
//! mutators. Reads take the read guard and clone a snapshot.
//!
//! # Failure handling
//!
//! If the backend cannot commit, the in-memory change is undone before the
//! error is returned. If the backend wrote the new state but could not
//! flush it, the change is kept and the error is still returned. Either
//! way, what readers observe equals what the backend holds.

use super::id::IdGenerator;
use super::record::{CollectionSpec, Fields, Patch, Record, SYSTEM_FIELDS, SortKey, SortOrder, sort_records};
use super::validate::ValidationError;
use super::{Result, StoreError};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

mod file;
mod memory;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;

#[cfg(test)]
mod tests;

/// Errors raised by persistence backends
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    /// The new state replaced the old one but could not be flushed to disk
    #[error("Commit applied but not flushed: {0}")]
    Unsynced(#[source] std::io::Error),
}

impl BackendError {
    /// Whether the backend already holds the new state despite the error
    pub fn is_applied(&self) -> bool {
        matches!(self, BackendError::Unsynced(_))
    }
}

/// State read back from a backend when a store is opened
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    /// Records in insertion order
    pub records: Vec<Record>,
    /// Identifier high-water mark, if the backend keeps one
    pub next_seq: Option<u64>,
    /// Set when unreadable data was discarded; describes what was lost
    pub discarded: Option<String>,
}

/// Persistence strategy behind a [`RecordStore`]
///
/// `commit` must be all-or-nothing: after a crash at any point, `load`
/// returns either the previous or the new state, never a mix. An error for
/// which [`BackendError::is_applied`] is true means the new state is in
/// place; any other error means the previous state is.
pub trait Backend: Send + Sync {
    /// Read the last committed state
    fn load(&self) -> std::result::Result<Loaded, BackendError>;

    /// Durably replace the stored state
    fn commit(&self, records: &[Record], next_seq: u64) -> std::result::Result<(), BackendError>;

    /// Human-readable location, used in log messages
    fn describe(&self) -> String;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn load(&self) -> std::result::Result<Loaded, BackendError> {
        (**self).load()
    }

    fn commit(&self, records: &[Record], next_seq: u64) -> std::result::Result<(), BackendError> {
        (**self).commit(records, next_seq)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn load(&self) -> std::result::Result<Loaded, BackendError> {
        (**self).load()
    }

    fn commit(&self, records: &[Record], next_seq: u64) -> std::result::Result<(), BackendError> {
        (**self).commit(records, next_seq)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Record store over a type-erased backend, as handed out by the registry
pub type DynRecordStore = RecordStore<Box<dyn Backend>>;

struct State {
    records: Vec<Record>,
    ids: IdGenerator,
}

/// One named collection of records
///
/// # Example
///
/// ```
/// use campstore::{CollectionSpec, MemoryBackend, Patch, RecordStore};
/// use serde_json::json;
///
/// let store = RecordStore::open(CollectionSpec::applicants(), MemoryBackend::new()).unwrap();
///
/// let fields = json!({"email": "a@b.co", "first_name": "Awa"});
/// let record = store.create(fields.as_object().unwrap().clone()).unwrap();
/// assert_eq!(record.id, "STU0001");
/// assert_eq!(record.status, "pending");
///
/// let updated = store.update(&record.id, Patch::status("confirmed")).unwrap();
/// assert_eq!(updated.status, "confirmed");
/// assert!(updated.status_changed_at.is_some());
///
/// store.delete(&record.id).unwrap();
/// assert!(store.is_empty());
/// ```
pub struct RecordStore<B: Backend> {
    spec: CollectionSpec,
    backend: B,
    state: RwLock<State>,
}

impl<B: Backend> RecordStore<B> {
    /// Open a collection, loading its committed state from `backend`
    ///
    /// Unreadable stored data yields an empty collection and a warning;
    /// any other load failure is returned as [`StoreError::Persistence`].
    pub fn open(spec: CollectionSpec, backend: B) -> Result<Self> {
        let loaded = backend.load().map_err(|source| StoreError::Persistence {
            collection: spec.name.clone(),
            source,
        })?;

        if let Some(reason) = &loaded.discarded {
            tracing::warn!(
                collection = %spec.name,
                location = %backend.describe(),
                %reason,
                "Stored collection was unreadable; starting from an empty collection"
            );
        }

        let mut records = Vec::with_capacity(loaded.records.len());
        for record in loaded.records {
            if records.iter().any(|r: &Record| r.id == record.id) {
                tracing::warn!(
                    collection = %spec.name,
                    id = %record.id,
                    "Dropping stored record with duplicate id"
                );
                continue;
            }
            records.push(record);
        }

        let ids = IdGenerator::resume(
            &spec.id_prefix,
            spec.id_width,
            loaded.next_seq,
            records.iter().map(|r| r.id.as_str()),
        );

        tracing::debug!(
            collection = %spec.name,
            location = %backend.describe(),
            records = records.len(),
            next_seq = ids.next_seq(),
            "Opened collection"
        );

        Ok(RecordStore {
            spec,
            backend,
            state: RwLock::new(State { records, ids }),
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Insert a new record built from `fields`
    ///
    /// System keys in `fields` are ignored. The record gets a fresh id, the
    /// collection's default status and the current time as `created_at`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidInput`]: the unique identity field is missing or not a string
    /// - [`StoreError::DuplicateKey`]: another record has the same identity value
    /// - [`StoreError::Persistence`]: the collection could not be committed
    pub fn create(&self, mut fields: Fields) -> Result<Record> {
        for key in SYSTEM_FIELDS {
            fields.remove(key);
        }
        let identity = self.identity_of(&fields)?;

        let mut guard = self.state.write();
        let State { records, ids } = &mut *guard;

        if let Some(value) = &identity {
            self.ensure_unique(records, value, None)?;
        }

        let (id, next_seq) = ids.candidate(|id| records.iter().any(|r| r.id == id));
        let record = Record {
            id,
            status: self.spec.default_status.clone(),
            created_at: Utc::now(),
            status_changed_at: None,
            fields,
        };

        records.push(record.clone());
        if let Err(source) = self.backend.commit(records, next_seq) {
            if source.is_applied() {
                ids.advance_to(next_seq);
            } else {
                records.pop();
            }
            return Err(self.persistence_failure("create", &record.id, source));
        }
        ids.advance_to(next_seq);

        tracing::debug!(collection = %self.spec.name, id = %record.id, "Record created");
        Ok(record)
    }

    /// Fetch a record by id
    pub fn get(&self, id: &str) -> Result<Record> {
        self.state
            .read()
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| self.not_found(id))
    }

    /// Snapshot of all records, newest first
    pub fn list(&self) -> Vec<Record> {
        self.list_by(&SortKey::default(), SortOrder::default())
    }

    /// Snapshot of all records in the requested order
    pub fn list_by(&self, key: &SortKey, order: SortOrder) -> Vec<Record> {
        let mut records = self.state.read().records.clone();
        sort_records(&mut records, key, order);
        records
    }

    /// Replace the status and/or fields present in `patch`
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidTransition`]: unknown status, or a system field in the patch
    /// - [`StoreError::NotFound`]: no record with this id
    /// - [`StoreError::InvalidInput`] / [`StoreError::DuplicateKey`]: the identity field
    ///   would become blank or collide with another record
    /// - [`StoreError::Persistence`]: the collection could not be committed
    pub fn update(&self, id: &str, patch: Patch) -> Result<Record> {
        if let Some(status) = &patch.status {
            if !self.spec.is_valid_status(status) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    reason: format!(
                        "status `{status}` is not one of: {}",
                        self.spec.statuses.join(", ")
                    ),
                });
            }
        }
        if let Some(key) = patch.fields.keys().find(|k| SYSTEM_FIELDS.contains(&k.as_str())) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                reason: format!("field `{key}` cannot be changed"),
            });
        }
        let identity = match &self.spec.unique_field {
            Some(field) if patch.fields.contains_key(field) => self.identity_of(&patch.fields)?,
            _ => None,
        };

        let mut guard = self.state.write();
        let State { records, ids } = &mut *guard;

        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| self.not_found(id))?;

        if let Some(value) = &identity {
            self.ensure_unique(records, value, Some(id))?;
        }

        let previous = records[index].clone();
        let record = &mut records[index];
        if let Some(status) = patch.status {
            if status != record.status {
                tracing::debug!(
                    collection = %self.spec.name,
                    id,
                    from = %record.status,
                    to = %status,
                    "Status changed"
                );
                record.status = status;
                record.status_changed_at = Some(Utc::now());
            }
        }
        for (key, value) in patch.fields {
            record.fields.insert(key, value);
        }
        let updated = record.clone();

        if let Err(source) = self.backend.commit(records, ids.next_seq()) {
            if !source.is_applied() {
                records[index] = previous;
            }
            return Err(self.persistence_failure("update", id, source));
        }

        Ok(updated)
    }

    /// Remove a record; its id is never issued again
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut guard = self.state.write();
        let State { records, ids } = &mut *guard;

        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| self.not_found(id))?;

        let removed = records.remove(index);
        if let Err(source) = self.backend.commit(records, ids.next_seq()) {
            if !source.is_applied() {
                records.insert(index, removed);
            }
            return Err(self.persistence_failure("delete", id, source));
        }

        tracing::debug!(collection = %self.spec.name, id, "Record deleted");
        Ok(())
    }

    /// Lower-cased value of the unique identity field, if the collection has one
    fn identity_of(&self, fields: &Fields) -> Result<Option<String>> {
        let Some(field) = &self.spec.unique_field else {
            return Ok(None);
        };
        match fields.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.trim().to_lowercase())),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                Err(ValidationError::Missing(field.clone()).into())
            }
            Some(_) => Err(ValidationError::WrongType {
                field: field.clone(),
                expected: "a string",
            }
            .into()),
        }
    }

    fn ensure_unique(&self, records: &[Record], value: &str, except: Option<&str>) -> Result<()> {
        let Some(field) = &self.spec.unique_field else {
            return Ok(());
        };
        let taken = records.iter().any(|r| {
            Some(r.id.as_str()) != except
                && r
                    .str_field(field)
                    .is_some_and(|existing| existing.trim().to_lowercase() == value)
        });
        if taken {
            return Err(StoreError::DuplicateKey {
                collection: self.spec.name.clone(),
                field: field.clone(),
                value: value.to_string(),
            });
        }
        Ok(())
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: self.spec.name.clone(),
            id: id.to_string(),
        }
    }

    fn persistence_failure(&self, operation: &str, id: &str, source: BackendError) -> StoreError {
        if source.is_applied() {
            tracing::error!(
                collection = %self.spec.name,
                location = %self.backend.describe(),
                operation,
                id,
                error = %source,
                "Commit written but not flushed; in-memory state kept"
            );
        } else {
            tracing::error!(
                collection = %self.spec.name,
                location = %self.backend.describe(),
                operation,
                id,
                error = %source,
                "Commit failed; in-memory state rolled back"
            );
        }
        StoreError::Persistence {
            collection: self.spec.name.clone(),
            source,
        }
    }
}
