//! Record Aggregator
//!
//! ## Overview
//!
//! Fuses independently arriving field updates into one in-flight
//! [`ObservationRecord`] and emits it exactly once when every required field
//! is present.
//!
//! ## State Machine
//!
//! ```text
//!              update (incomplete)
//!               ┌──────────┐
//!               ▼          │
//!  start ──► COLLECTING ───┘
//!               │  ▲
//!   update      │  │ fresh empty record installed
//!   completes   ▼  │ (same critical section)
//!             EMITTING ──► sink.persist(record)   (outside the lock)
//! ```
//!
//! Emitting is atomic with respect to other updates: the merge, the
//! completion check and the reset happen under one mutex acquisition, so if
//! two updates race for the last missing field exactly one of them observes
//! completion. Persistence runs after the lock is released; a sink failure is
//! returned to the caller but the reset has already happened.
//!
//! ## Timestamp Policy
//!
//! | Policy | `timestamp` after an update |
//! |--------|-----------------------------|
//! | `EveryUpdate` (default) | receipt time of the last update touching the record |
//! | `FirstUpdate` | receipt time of the first update after a reset |
//!
//! Diagnostic updates (raw gas) stamp the timestamp only when
//! `stamp_diagnostic` is set; they never touch a field and never trigger a
//! completion check.

use crate::errors::AggregateError;
use crate::events::FieldUpdate;
use crate::record::{ObservationRecord, RequiredFields};
use crate::storage::RecordSink;
use crate::time::{format_timestamp, Timestamp};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// When the in-flight record's timestamp is (re)stamped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    #[default]
    EveryUpdate,
    FirstUpdate,
}

/// Aggregation behaviour
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Fields that must all be set for a record to complete
    pub required: RequiredFields,
    pub timestamp_policy: TimestampPolicy,
    /// Whether diagnostic updates stamp the timestamp
    pub stamp_diagnostic: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            required: RequiredFields::default(),
            timestamp_policy: TimestampPolicy::default(),
            stamp_diagnostic: true,
        }
    }
}

impl AggregatorConfig {
    pub fn with_required(mut self, required: RequiredFields) -> Self {
        self.required = required;
        self
    }

    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = policy;
        self
    }

    pub fn with_stamp_diagnostic(mut self, stamp: bool) -> Self {
        self.stamp_diagnostic = stamp;
        self
    }
}

/// Result of applying one update
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Merged; the record is still missing fields. Carries the merged state.
    Collecting(ObservationRecord),
    /// Diagnostic update; no field changed and no completion check ran
    Diagnostic,
    /// This update completed the record, which was persisted and reset
    Completed(ObservationRecord),
}

impl MergeOutcome {
    /// The completed record, if this update completed one
    pub fn completed(self) -> Option<ObservationRecord> {
        match self {
            MergeOutcome::Completed(record) => Some(record),
            _ => None,
        }
    }

    /// Record state right after the merge, if a field was merged
    pub fn record(&self) -> Option<&ObservationRecord> {
        match self {
            MergeOutcome::Collecting(record) | MergeOutcome::Completed(record) => Some(record),
            MergeOutcome::Diagnostic => None,
        }
    }
}

/// Owner of the single in-flight record of one aggregation stream
pub struct Aggregator {
    config: AggregatorConfig,
    in_flight: Mutex<ObservationRecord>,
    sink: Arc<dyn RecordSink>,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            config,
            in_flight: Mutex::new(ObservationRecord::empty()),
            sink,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Merge one update; persists and resets when it completes the record
    pub fn apply(&self, update: &FieldUpdate) -> Result<MergeOutcome, AggregateError> {
        let completed = {
            let mut in_flight = self.lock();
            let current = std::mem::take(&mut *in_flight);

            if update.kind().is_diagnostic() {
                *in_flight = if self.config.stamp_diagnostic {
                    self.stamp(current, update.received_at)
                } else {
                    current
                };
                debug!("Diagnostic {} update at {}", update.kind(), format_timestamp(&update.received_at));
                return Ok(MergeOutcome::Diagnostic);
            }

            let merged = self.stamp(current, update.received_at).merge(&update.payload);
            if !self.config.required.is_complete(&merged) {
                *in_flight = merged.clone();
                return Ok(MergeOutcome::Collecting(merged));
            }
            // in_flight already holds the fresh empty record left by take()
            merged
        };

        let timestamp = completed.timestamp().map(|ts| format_timestamp(&ts)).unwrap_or_default();
        match self.sink.persist(&completed) {
            Ok(()) => {
                info!("Record completed at {timestamp}");
                Ok(MergeOutcome::Completed(completed))
            }
            Err(source) => Err(AggregateError::Persistence {
                timestamp,
                source,
                record: Box::new(completed),
            }),
        }
    }

    /// Copy of the in-flight record
    pub fn snapshot(&self) -> ObservationRecord {
        self.lock().clone()
    }

    /// Discard the in-flight record, returning it
    pub fn reset(&self) -> ObservationRecord {
        std::mem::take(&mut *self.lock())
    }

    fn stamp(&self, record: ObservationRecord, at: Timestamp) -> ObservationRecord {
        match self.config.timestamp_policy {
            TimestampPolicy::EveryUpdate => record.with_timestamp(at),
            TimestampPolicy::FirstUpdate if record.timestamp().is_none() => record.with_timestamp(at),
            TimestampPolicy::FirstUpdate => record,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ObservationRecord> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
