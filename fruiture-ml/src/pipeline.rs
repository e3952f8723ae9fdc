//! Periodic Summarizer
//!
//! One tick:
//!
//! 1. Read every persisted record; an empty set skips the tick
//! 2. Compute the [`SummaryRecord`] and write the JSON snapshot
//! 3. If a model is loaded and every feature is set, predict
//! 4. Gate actuation on confidence, then evaluate the alert policy
//! 5. Append the summary and prediction columns to the history log
//!
//! Each side effect is best-effort: a failed write is logged and the tick
//! carries on. Publishing is left to the caller, which receives a
//! [`TickReport`].

use crate::alert::{Alert, AlertPolicy};
use crate::model::ModelState;
use crate::scoring::{ActuationCommand, FeatureVector, Prediction};
use crate::MLError;
use fruiture_core::constants::pipeline::MIN_ACTION_CONFIDENCE;
use fruiture_core::storage::write_json_snapshot;
use fruiture_core::summary::round_summary;
use fruiture_core::time::serde_timestamp;
use fruiture_core::{CsvLog, RecordSource, SummaryRecord, Timestamp};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Summarizer settings
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizerConfig {
    /// Minimum class probability before actuating
    pub min_confidence: f64,
    /// Latest summary, rewritten every tick
    pub snapshot_path: Option<PathBuf>,
    /// Append-only summary history
    pub history_path: Option<PathBuf>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            min_confidence: MIN_ACTION_CONFIDENCE,
            snapshot_path: None,
            history_path: None,
        }
    }
}

impl SummarizerConfig {
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }
}

/// Everything a tick produced
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub summary: SummaryRecord,
    /// Model output, whether or not it passed the confidence gate
    pub prediction: Option<Prediction>,
    /// Set only when the prediction passed the gate
    pub actuation: Option<ActuationCommand>,
    pub alert: Option<Alert>,
}

/// History row: the summary plus prediction columns
#[derive(Debug, Serialize, Deserialize)]
struct HistoryRow {
    #[serde(with = "serde_timestamp")]
    timestamp: Timestamp,
    record_count: usize,
    average_temperature: Option<f64>,
    average_humidity: Option<f64>,
    average_gas: Option<f64>,
    max_gas: Option<f64>,
    #[serde(rename = "average_R")]
    average_r: Option<f64>,
    #[serde(rename = "average_G")]
    average_g: Option<f64>,
    #[serde(rename = "average_B")]
    average_b: Option<f64>,
    predicted_day: Option<u8>,
    confidence: Option<f64>,
    servo_angle: Option<u16>,
}

impl HistoryRow {
    fn new(summary: &SummaryRecord, prediction: Option<&Prediction>) -> Self {
        Self {
            timestamp: summary.timestamp,
            record_count: summary.record_count,
            average_temperature: summary.average_temperature,
            average_humidity: summary.average_humidity,
            average_gas: summary.average_gas,
            max_gas: summary.max_gas,
            average_r: summary.average_r,
            average_g: summary.average_g,
            average_b: summary.average_b,
            predicted_day: prediction.map(|p| p.day),
            confidence: prediction.and_then(|p| p.confidence).map(round_summary),
            servo_angle: prediction.map(Prediction::actuator_angle),
        }
    }
}

/// Timer-driven summary and prediction stage
pub struct Summarizer {
    source: Arc<dyn RecordSource>,
    model: ModelState,
    alerts: AlertPolicy,
    config: SummarizerConfig,
    history: Option<CsvLog>,
}

impl Summarizer {
    pub fn new(source: Arc<dyn RecordSource>, model: ModelState) -> Self {
        Self {
            source,
            model,
            alerts: AlertPolicy::default(),
            config: SummarizerConfig::default(),
            history: None,
        }
    }

    pub fn with_config(mut self, config: SummarizerConfig) -> Self {
        self.history = config.history_path.clone().map(CsvLog::new);
        self.config = config;
        self
    }

    pub fn with_alert_policy(mut self, alerts: AlertPolicy) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn model(&self) -> &ModelState {
        &self.model
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Run one tick stamped `at`; `None` when there is nothing to summarize
    pub fn tick(&self, at: Timestamp) -> Option<TickReport> {
        let records = match self.source.records() {
            Ok(records) => records,
            Err(e) => {
                warn!("Summary skipped, records unreadable: {e}");
                return None;
            }
        };
        let Some(summary) = SummaryRecord::compute(&records, at) else {
            debug!("Summary skipped, no records yet");
            return None;
        };

        if let Some(path) = &self.config.snapshot_path {
            if let Err(e) = write_json_snapshot(path, &summary) {
                warn!("Failed to write {}: {e}", path.display());
            }
        }

        let prediction = self.predict(&summary);
        let actuation = prediction.as_ref().and_then(|p| match p.check_confidence(self.config.min_confidence) {
            Ok(()) => Some(ActuationCommand::new(p, summary.timestamp)),
            Err(e) => {
                info!("Actuation skipped: {e}");
                None
            }
        });
        let alert = match (&prediction, &actuation) {
            (Some(p), Some(_)) => self.alerts.evaluate(p, summary.timestamp),
            _ => None,
        };

        if let Some(history) = &self.history {
            if let Err(e) = history.append(&HistoryRow::new(&summary, prediction.as_ref())) {
                warn!("Failed to append to {}: {e}", history.path().display());
            }
        }

        info!(
            "Summary of {} records{}",
            summary.record_count,
            prediction
                .map(|p| format!(", predicted day {}", p.day))
                .unwrap_or_default()
        );
        Some(TickReport {
            summary,
            prediction,
            actuation,
            alert,
        })
    }

    fn predict(&self, summary: &SummaryRecord) -> Option<Prediction> {
        if !self.model.is_loaded() {
            return None;
        }
        let features = match FeatureVector::from_summary(summary) {
            Ok(features) => features,
            Err(e) => {
                info!("Prediction skipped: {e}");
                return None;
            }
        };
        match self.model.predict(&features) {
            Ok(prediction) => Some(prediction),
            Err(MLError::MissingArtifact(_)) => None,
            Err(e) => {
                warn!("Prediction failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fruiture_core::time::parse_timestamp;
    use fruiture_core::{MemoryStore, ObservationRecord, RecordSink};

    fn at() -> Timestamp {
        parse_timestamp("2025-03-14 12:10:00").unwrap()
    }

    #[test]
    fn test_empty_store_skips_tick() {
        let summarizer = Summarizer::new(Arc::new(MemoryStore::new()), ModelState::NotLoaded);
        assert_eq!(summarizer.tick(at()), None);
    }

    #[test]
    fn test_summary_only_without_model() {
        let store = Arc::new(MemoryStore::new());
        store
            .persist(&ObservationRecord::empty().with_temperature(20.0).with_gas(1.0))
            .unwrap();
        let summarizer = Summarizer::new(store, ModelState::NotLoaded);

        let report = summarizer.tick(at()).unwrap();
        assert_eq!(report.summary.record_count, 1);
        assert_eq!(report.prediction, None);
        assert_eq!(report.actuation, None);
        assert_eq!(report.alert, None);
    }

    #[test]
    fn test_history_row_columns() {
        let summary = SummaryRecord::compute(&[ObservationRecord::empty().with_gas(2.0)], at()).unwrap();
        let row = HistoryRow::new(&summary, Some(&Prediction::from_raw(3.0, Some(0.91234))));
        assert_eq!(row.predicted_day, Some(3));
        assert_eq!(row.confidence, Some(0.912));
        assert_eq!(row.servo_angle, Some(90));
        assert_eq!(HistoryRow::new(&summary, None).servo_angle, None);
    }
}
