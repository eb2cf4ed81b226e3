//! In-process record store.

use super::{EmotionRecord, RecordFilter, RecordStore, StoreError};
use std::sync::RwLock;

/// Records held in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<EmotionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: EmotionRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))?;
        records.push(record);
        Ok(())
    }

    fn find(&self, filter: &RecordFilter) -> Result<Vec<EmotionRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))?;
        Ok(filter.apply(records.iter()))
    }
}
