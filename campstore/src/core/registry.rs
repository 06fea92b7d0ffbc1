//! Collection-name addressed access to record stores
//!
//! A [`Registry`] knows which collections exist and how they are
//! persisted. Stores are opened on first use and shared afterwards, so
//! every caller addressing `"applicants"` goes through the same lock.
//! Each collection opens under its own lock; a slow first load of one
//! collection never holds up another.

use super::record::{CollectionSpec, Fields, Patch, Record, SortKey, SortOrder};
use super::store::{Backend, DynRecordStore, JsonFileBackend, MemoryBackend, RecordStore};
use super::{Result, StoreError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// Where collections are persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// One JSON file per collection inside this directory
    Files(PathBuf),
    /// Nothing survives the process
    Memory,
}

/// Builder for a [`Registry`]
///
/// # Example
///
/// ```
/// use campstore::{CollectionSpec, Registry, Storage};
///
/// let registry = Registry::builder()
///     .storage(Storage::Memory)
///     .collection(CollectionSpec::new("waitlist", "WL", &["waiting", "admitted"]))
///     .build();
///
/// assert_eq!(registry.names(), ["waitlist"]);
/// assert!(registry.collection("applicants").is_err());
/// ```
pub struct RegistryBuilder {
    storage: Storage,
    specs: Vec<CollectionSpec>,
}

impl RegistryBuilder {
    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    /// Register a collection; a later spec with the same name replaces the earlier one
    pub fn collection(mut self, spec: CollectionSpec) -> Self {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            storage: self.storage,
            slots: self
                .specs
                .into_iter()
                .map(|spec| Slot {
                    spec,
                    store: OnceLock::new(),
                    opening: Mutex::new(()),
                })
                .collect(),
        }
    }
}

struct Slot {
    spec: CollectionSpec,
    store: OnceLock<Arc<DynRecordStore>>,
    opening: Mutex<()>,
}

/// Set of named collections sharing one storage location
pub struct Registry {
    storage: Storage,
    slots: Vec<Slot>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            storage: Storage::Memory,
            specs: Vec::new(),
        }
    }

    /// Registry holding the camp collections, `applicants` and `messages`
    pub fn new(storage: Storage) -> Self {
        Self::builder()
            .storage(storage)
            .collection(CollectionSpec::applicants())
            .collection(CollectionSpec::messages())
            .build()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Registered collection names in registration order
    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.spec.name.clone()).collect()
    }

    /// The store for `name`, opening it on first use
    pub fn collection(&self, name: &str) -> Result<Arc<DynRecordStore>> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.spec.name == name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))?;

        if let Some(store) = slot.store.get() {
            return Ok(Arc::clone(store));
        }

        let _opening = slot.opening.lock();
        // Another caller may have opened it while we waited
        if let Some(store) = slot.store.get() {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(self.open(slot.spec.clone())?);
        let _ = slot.store.set(Arc::clone(&store));
        Ok(store)
    }

    /// Open every registered collection, surfacing load errors up front
    pub fn open_all(&self) -> Result<()> {
        for slot in &self.slots {
            self.collection(&slot.spec.name)?;
        }
        Ok(())
    }

    fn open(&self, spec: CollectionSpec) -> Result<DynRecordStore> {
        let backend: Box<dyn Backend> = match &self.storage {
            Storage::Files(dir) => Box::new(JsonFileBackend::new(dir.clone(), &spec.name).map_err(
                |source| StoreError::Persistence {
                    collection: spec.name.clone(),
                    source,
                },
            )?),
            Storage::Memory => Box::new(MemoryBackend::new()),
        };
        RecordStore::open(spec, backend)
    }

    pub fn create(&self, collection: &str, fields: Fields) -> Result<Record> {
        self.collection(collection)?.create(fields)
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Record> {
        self.collection(collection)?.get(id)
    }

    pub fn list(&self, collection: &str) -> Result<Vec<Record>> {
        Ok(self.collection(collection)?.list())
    }

    pub fn list_by(&self, collection: &str, key: &SortKey, order: SortOrder) -> Result<Vec<Record>> {
        Ok(self.collection(collection)?.list_by(key, order))
    }

    pub fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<Record> {
        self.collection(collection)?.update(id, patch)
    }

    pub fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.collection(collection)?.delete(id)
    }
}
