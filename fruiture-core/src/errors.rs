//! Error Types for Ingestion, Estimation and Persistence
//!
//! ## Error Categories
//!
//! Every error in this module is recoverable: the ingestion and summary
//! workers log it once and carry on with the next message or tick.
//!
//! ### Frame problems
//! - `RipenessError::Decode`: payload is not a decodable image
//! - `RipenessError::NoBananaDetected`: valid frame, no qualifying object
//!
//! ### Payload problems
//! - `IngestError::Parse`: scalar payload carries no numeric token
//! - `IngestError::Unrouted`: topic matches no routing rule
//!
//! ### Storage problems
//! - `StorageError`: the downstream CSV/JSON/image store failed
//! - `AggregateError::Persistence`: a completed record could not be stored.
//!   The in-flight record has already been reset when this is returned, and
//!   the error carries the lost record.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use fruiture_core::{IngestError, RipenessError};
//!
//! fn handle(err: &IngestError) {
//!     match err {
//!         IngestError::Ripeness(RipenessError::NoBananaDetected) => {
//!             // Frame is fine, nothing to measure; keep aggregating
//!         }
//!         IngestError::Ripeness(RipenessError::Decode(_)) => {
//!             // Corrupt frame from the camera
//!         }
//!         _ => {}
//!     }
//! }
//! ```

use crate::record::ObservationRecord;
use thiserror_no_std::Error;

/// Result type for ripeness estimation
pub type RipenessResult<T> = Result<T, RipenessError>;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Ripeness estimation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RipenessError {
    /// Payload could not be decoded into an image
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// Frame decoded but no object passed the area threshold
    #[error("No banana detected in frame")]
    NoBananaDetected,
}

/// Persistence failures of the record, log and blob stores
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tabular log could not be written or read back
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Snapshot could not be serialized or parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Annotated frame could not be encoded
    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),
}

/// Failures turning an inbound message into a field update
#[derive(Error, Debug)]
pub enum IngestError {
    /// Scalar payload contained no number
    #[error("No numeric value in {channel} payload {payload:?}")]
    Parse {
        /// Channel the payload was routed to
        channel: &'static str,
        /// Offending payload, lossily decoded
        payload: String,
    },

    /// Topic matched no routing rule
    #[error("Topic {0:?} matches no routing rule")]
    Unrouted(String),

    /// Image channel failed estimation
    #[error(transparent)]
    Ripeness(#[from] RipenessError),

    /// Frame could not be archived
    #[error("Frame archive failed: {0}")]
    Storage(#[from] StorageError),
}

/// Aggregation failures
#[derive(Error, Debug)]
pub enum AggregateError {
    /// Completed record was dropped because the sink failed
    #[error("Record completed at {timestamp} was not persisted: {source}")]
    Persistence {
        /// Capture time of the lost record
        timestamp: String,
        /// Underlying storage failure
        source: StorageError,
        /// The record that was lost
        record: Box<ObservationRecord>,
    },
}

impl AggregateError {
    /// The completed record this error is about
    pub fn record(&self) -> &ObservationRecord {
        match self {
            AggregateError::Persistence { record, .. } => record.as_ref(),
        }
    }
}
