//! In-memory record store for tests and dry runs

use super::{RecordSink, RecordSource};
use crate::errors::{StorageError, StorageResult};
use crate::record::ObservationRecord;
use std::sync::{Mutex, PoisonError};

/// Append-only vector of records
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ObservationRecord>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails, for exercising the persistence error path
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_writes: true,
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemoryStore {
    fn persist(&self, record: &ObservationRecord) -> StorageResult<()> {
        if self.fail_writes {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store rejects writes",
            )));
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

impl RecordSource for MemoryStore {
    fn records(&self) -> StorageResult<Vec<ObservationRecord>> {
        Ok(self.records.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
