//! Persistence collaborators
//!
//! ## Overview
//!
//! The core owns no storage. It talks to three seams:
//!
//! | Trait | Used by | Backends |
//! |-------|---------|----------|
//! | [`RecordSink`] | aggregator, on completion | [`CsvRecordStore`], [`MemoryStore`] |
//! | [`RecordSource`] | summarizer, status display | [`CsvRecordStore`], [`MemoryStore`] |
//! | [`BlobStore`] | ingestion router, per frame | [`FsBlobStore`] |
//!
//! Records are append-only: once persisted they are never rewritten, which is
//! what lets the summarizer read without the aggregator's lock.
//!
//! ## File Layout
//!
//! ```text
//! data/
//! ├── banana_records.csv      completed records
//! ├── sensor_log.csv          scalar snapshot per accepted update
//! ├── ml_input.json           latest summary
//! ├── prediction_history.csv  summaries with prediction columns
//! └── images/
//!     ├── raw_2025-03-14_12-00-00.jpg
//!     └── processed_2025-03-14_12-00-00.png
//! ```

mod blob;
mod memory;
mod snapshot;
mod tabular;

pub use blob::FsBlobStore;
pub use memory::MemoryStore;
pub use snapshot::{read_json, write_json_snapshot};
pub use tabular::{CsvLog, CsvRecordStore, CsvSensorLog};

use crate::errors::StorageResult;
use crate::record::ObservationRecord;
use crate::time::Timestamp;
use image::RgbImage;

/// Destination of completed records
pub trait RecordSink: Send + Sync {
    /// Append one completed record
    fn persist(&self, record: &ObservationRecord) -> StorageResult<()>;
}

/// Read access to the persisted record set
pub trait RecordSource: Send + Sync {
    /// Every record persisted so far, oldest first
    fn records(&self) -> StorageResult<Vec<ObservationRecord>>;

    /// The last `n` records, oldest first
    fn recent(&self, n: usize) -> StorageResult<Vec<ObservationRecord>> {
        let mut all = self.records()?;
        let skip = all.len().saturating_sub(n);
        Ok(all.split_off(skip))
    }
}

/// References to an archived frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFrame {
    /// File name of the raw frame as received
    pub raw: String,
    /// File name of the annotated copy, when one was produced
    pub processed: Option<String>,
}

/// Archive for camera frames
pub trait BlobStore: Send + Sync {
    /// Store the raw bytes and, if given, an annotated copy
    fn store(&self, raw: &[u8], annotated: Option<&RgbImage>, at: Timestamp) -> StorageResult<StoredFrame>;
}
