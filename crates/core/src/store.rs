use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use thiserror::Error;

use crate::domain::request::{RequestId, RequestRecord};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("request `{0}` was not found")]
    NotFound(RequestId),
    #[error("request `{0}` already exists")]
    Duplicate(RequestId),
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Storage seam for the decision engine.
///
/// `update` is the per-key atomic transition: the closure runs against a
/// copy of the record while no other update for the same id can interleave,
/// and the copy replaces the stored record only if the closure returns `Ok`.
/// Updates for different ids must not block each other.
pub trait RecordStore: Send + Sync {
    fn load(&self, id: &RequestId) -> Result<Option<RequestRecord>, StoreError>;

    fn insert(&self, record: RequestRecord) -> Result<(), StoreError>;

    fn update<T, E, F>(&self, id: &RequestId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut RequestRecord) -> Result<T, E>,
        E: From<StoreError>;

    fn list(&self) -> Result<Vec<RequestRecord>, StoreError>;
}

type Slot = Arc<Mutex<RequestRecord>>;

/// Map lock is held only long enough to find the slot; the slot's own
/// mutex serializes decisions on that record.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<RequestId, Slot>>,
}

impl InMemoryRecordStore {
    pub fn with_records(records: impl IntoIterator<Item = RequestRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.clone(), Arc::new(Mutex::new(record))))
            .collect();
        Self { records: RwLock::new(records) }
    }

    fn slot(&self, id: &RequestId) -> Option<Slot> {
        let records = match self.records.read() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.get(id).cloned()
    }
}

fn lock_slot(slot: &Slot) -> MutexGuard<'_, RequestRecord> {
    match slot.lock() {
        Ok(record) => record,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, id: &RequestId) -> Result<Option<RequestRecord>, StoreError> {
        Ok(self.slot(id).map(|slot| lock_slot(&slot).clone()))
    }

    fn insert(&self, record: RequestRecord) -> Result<(), StoreError> {
        let mut records = match self.records.write() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        records.insert(record.id.clone(), Arc::new(Mutex::new(record)));
        Ok(())
    }

    fn update<T, E, F>(&self, id: &RequestId, apply: F) -> Result<T, E>
    where
        F: FnOnce(&mut RequestRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let slot = self.slot(id).ok_or_else(|| E::from(StoreError::NotFound(id.clone())))?;
        let mut stored = lock_slot(&slot);

        let mut working = stored.clone();
        let value = apply(&mut working)?;
        *stored = working;
        Ok(value)
    }

    fn list(&self) -> Result<Vec<RequestRecord>, StoreError> {
        let slots: Vec<Slot> = {
            let records = match self.records.read() {
                Ok(records) => records,
                Err(poisoned) => poisoned.into_inner(),
            };
            records.values().cloned().collect()
        };
        Ok(slots.iter().map(|slot| lock_slot(slot).clone()).collect())
    }
}
