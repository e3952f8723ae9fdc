//! Core fusion engine for Fruiture
//!
//! Fuses asynchronous banana-monitoring telemetry (temperature, humidity, gas
//! and camera frames) into complete observation records, and estimates peel
//! ripeness from frames by colour segmentation.
//!
//! Key constraints:
//! - One in-flight record per stream, mutated only under one lock
//! - Image decoding and segmentation never run under that lock
//! - Every failure is recoverable; workers log and carry on
//!
//! ```no_run
//! use fruiture_core::{
//!     Aggregator, AggregatorConfig, EstimatorStrategy, InboundMessage, IngestionRouter,
//!     MemoryStore, RoutingTable, SystemTime, TimeSource,
//! };
//! use std::sync::Arc;
//!
//! let router = IngestionRouter::new(RoutingTable::default(), EstimatorStrategy::default().build(false));
//! let aggregator = Aggregator::new(AggregatorConfig::default(), Arc::new(MemoryStore::new()));
//!
//! let message = InboundMessage::new("banana/temperature", "24.5", SystemTime.now());
//! if let Ok(update) = router.route(&message) {
//!     match aggregator.apply(&update) {
//!         Ok(outcome) => {} // Collecting, Diagnostic or Completed
//!         Err(e) => {}      // Record lost to a storage failure; already reset
//!     }
//! }
//! ```

#![deny(unsafe_code)]

pub mod aggregator;
pub mod constants;
pub mod errors;
pub mod events;
pub mod ingest;
pub mod record;
pub mod ripeness;
pub mod routing;
pub mod storage;
pub mod summary;
pub mod time;

// Public API
pub use aggregator::{Aggregator, AggregatorConfig, MergeOutcome, TimestampPolicy};
pub use errors::{AggregateError, IngestError, RipenessError, RipenessResult, StorageError, StorageResult};
pub use events::{ChannelKind, FieldPayload, FieldUpdate, ImageObservation, InboundMessage};
pub use ingest::IngestionRouter;
pub use record::{ObservationRecord, RequiredField, RequiredFields, ScalarSnapshot};
pub use ripeness::{
    ripeness_score, rgb_to_ripeness, ColorClass, ColorProportions, Estimate, EstimatorStrategy, HueEstimator,
    RgbColor, RipenessEstimator, SegmentationEstimator,
};
pub use routing::{RoutingRule, RoutingTable, TopicPattern};
pub use storage::{
    BlobStore, CsvLog, CsvRecordStore, CsvSensorLog, FsBlobStore, MemoryStore, RecordSink, RecordSource,
    StoredFrame,
};
pub use summary::SummaryRecord;
pub use time::{FixedTime, SystemTime, TimeSource, Timestamp};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
