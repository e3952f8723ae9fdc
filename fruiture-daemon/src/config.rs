//! Daemon configuration
//!
//! One YAML file, every section optional. An empty file is the reference
//! deployment: public test broker, archival completion, segmentation
//! estimator, ten-minute summaries.
//!
//! ```yaml
//! mqtt:
//!   host: broker.local
//!   subscription: fruiture/#
//! ingest:
//!   required: minimal            # or archival, or a field list
//!   timestamp_policy: every_update
//!   strategy: segmentation
//! storage:
//!   data_dir: data
//! summary:
//!   interval_secs: 600
//!   model_path: models/banana_forest.json
//! alert:
//!   remaining_days: 4
//!   credentials: credentials.txt
//! ```

use anyhow::{bail, Context, Result};
use fruiture_connectors::MqttConfig;
use fruiture_core::constants::pipeline::{
    ACTUATION_TOPIC, INGEST_CHANNEL_CAPACITY, MIN_ACTION_CONFIDENCE, SUMMARY_INTERVAL_SECS, SUMMARY_TOPIC,
};
use fruiture_core::{AggregatorConfig, EstimatorStrategy, RequiredField, RequiredFields, RoutingTable, TimestampPolicy};
use fruiture_ml::{AlertPolicy, SummarizerConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttSection,
    pub ingest: IngestConfig,
    pub storage: StorageConfig,
    pub summary: SummaryConfig,
    pub alert: AlertConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.ingest.required_fields()?;
        if self.ingest.channel_capacity == 0 {
            bail!("ingest.channel_capacity must be at least 1");
        }
        if self.summary.interval_secs == 0 {
            bail!("summary.interval_secs must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.summary.min_confidence) {
            bail!("summary.min_confidence must lie in 0..=1, got {}", self.summary.min_confidence);
        }
        Ok(())
    }
}

/// Broker settings plus the outbound topics
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    #[serde(flatten)]
    pub broker: MqttConfig,
    pub summary_topic: String,
    pub actuation_topic: String,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker: MqttConfig::default(),
            summary_topic: SUMMARY_TOPIC.to_string(),
            actuation_topic: ACTUATION_TOPIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredPreset {
    Minimal,
    Archival,
}

/// Completion set: a named preset or an explicit field list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RequiredSet {
    Preset(RequiredPreset),
    Fields(Vec<RequiredField>),
}

impl Default for RequiredSet {
    fn default() -> Self {
        RequiredSet::Preset(RequiredPreset::Archival)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Messages buffered between the MQTT loop and the ingestion worker
    pub channel_capacity: usize,
    pub required: RequiredSet,
    pub timestamp_policy: TimestampPolicy,
    pub stamp_diagnostic: bool,
    pub strategy: EstimatorStrategy,
    /// Archive an annotated copy of every accepted frame
    pub annotate: bool,
    pub routing: RoutingTable,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            channel_capacity: INGEST_CHANNEL_CAPACITY,
            required: RequiredSet::default(),
            timestamp_policy: TimestampPolicy::default(),
            stamp_diagnostic: true,
            strategy: EstimatorStrategy::default(),
            annotate: true,
            routing: RoutingTable::default(),
        }
    }
}

impl IngestConfig {
    pub fn required_fields(&self) -> Result<RequiredFields> {
        match &self.required {
            RequiredSet::Preset(RequiredPreset::Minimal) => Ok(RequiredFields::minimal()),
            RequiredSet::Preset(RequiredPreset::Archival) => Ok(RequiredFields::archival()),
            RequiredSet::Fields(fields) if fields.is_empty() => {
                bail!("ingest.required must name at least one field")
            }
            RequiredSet::Fields(fields) => Ok(RequiredFields::new(fields.iter().copied())),
        }
    }

    pub fn aggregator_config(&self) -> Result<AggregatorConfig> {
        Ok(AggregatorConfig::default()
            .with_required(self.required_fields()?)
            .with_timestamp_policy(self.timestamp_policy)
            .with_stamp_diagnostic(self.stamp_diagnostic))
    }
}

/// File layout under `data_dir`; relative names resolve against it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub records: PathBuf,
    pub sensor_log: PathBuf,
    pub images: PathBuf,
    pub snapshot: PathBuf,
    pub history: PathBuf,
    /// Keep appending to a records file left by a previous run
    pub resume: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            records: PathBuf::from("banana_records.csv"),
            sensor_log: PathBuf::from("sensor_log.csv"),
            images: PathBuf::from("images"),
            snapshot: PathBuf::from("ml_input.json"),
            history: PathBuf::from("prediction_history.csv"),
            resume: false,
        }
    }
}

impl StorageConfig {
    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join(&self.records)
    }

    pub fn sensor_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.sensor_log)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(&self.images)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub interval_secs: u64,
    pub min_confidence: f64,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            interval_secs: SUMMARY_INTERVAL_SECS,
            min_confidence: MIN_ACTION_CONFIDENCE,
            model_path: PathBuf::from("models/banana_forest.json"),
            scaler_path: PathBuf::from("models/scaler.json"),
        }
    }
}

impl SummaryConfig {
    pub fn summarizer_config(&self, storage: &StorageConfig) -> SummarizerConfig {
        SummarizerConfig::default()
            .with_min_confidence(self.min_confidence)
            .with_snapshot_path(storage.snapshot_path())
            .with_history_path(storage.history_path())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    #[serde(flatten)]
    pub policy: AlertPolicy,
    /// Telegram token and chat ids; alerts are disabled when absent
    pub credentials: PathBuf,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            policy: AlertPolicy::default(),
            credentials: PathBuf::from("credentials.txt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fruiture_core::{ChannelKind, RoutingRule, TopicPattern};

    #[test]
    fn test_empty_file_is_reference_deployment() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.mqtt.broker.host, "test.mosquitto.org");
        assert_eq!(config.mqtt.summary_topic, "fruiture/ml_input");
        assert_eq!(config.mqtt.actuation_topic, "fruiture/servo_angle");
        assert_eq!(config.summary.interval_secs, 600);
        assert_eq!(config.alert.policy.remaining_days, 4.0);
        assert_eq!(config.ingest.required_fields().unwrap(), RequiredFields::archival());
        assert_eq!(config.storage.records_path(), PathBuf::from("data/banana_records.csv"));
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = Config::from_yaml(
            "mqtt:\n  host: broker.local\n  port: 1884\nsummary:\n  interval_secs: 60\nalert:\n  remaining_days: 2\n",
        )
        .unwrap();
        assert_eq!(config.mqtt.broker.host, "broker.local");
        assert_eq!(config.mqtt.broker.port, 1884);
        assert_eq!(config.mqtt.broker.subscription, "fruiture/#");
        assert_eq!(config.mqtt.summary_topic, "fruiture/ml_input");
        assert_eq!(config.summary.interval_secs, 60);
        assert_eq!(config.summary.min_confidence, 0.7);
        assert_eq!(config.alert.policy.remaining_days, 2.0);
        assert_eq!(config.alert.credentials, PathBuf::from("credentials.txt"));
    }

    #[test]
    fn test_required_preset_and_list() {
        let config = Config::from_yaml("ingest:\n  required: minimal\n").unwrap();
        assert_eq!(config.ingest.required_fields().unwrap(), RequiredFields::minimal());

        let config = Config::from_yaml("ingest:\n  required: [timestamp, temperature, ripeness]\n").unwrap();
        assert_eq!(
            config.ingest.required_fields().unwrap().fields(),
            [RequiredField::Timestamp, RequiredField::Temperature, RequiredField::Ripeness]
        );
    }

    #[test]
    fn test_empty_required_list_rejected() {
        assert!(Config::from_yaml("ingest:\n  required: []\n").is_err());
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        assert!(Config::from_yaml("summary:\n  min_confidence: 1.5\n").is_err());
    }

    #[test]
    fn test_aggregation_policy() {
        let config = Config::from_yaml(
            "ingest:\n  timestamp_policy: first_update\n  stamp_diagnostic: false\n  strategy: hue\n",
        )
        .unwrap();
        let aggregator = config.ingest.aggregator_config().unwrap();
        assert_eq!(aggregator.timestamp_policy, TimestampPolicy::FirstUpdate);
        assert!(!aggregator.stamp_diagnostic);
        assert_eq!(config.ingest.strategy, EstimatorStrategy::Hue);
    }

    #[test]
    fn test_custom_routing() {
        let config = Config::from_yaml(
            "ingest:\n  routing:\n    - pattern: {contains: celsius}\n      channel: temperature\n    - pattern: {sequence: [cam, frame]}\n      channel: image\n",
        )
        .unwrap();
        assert_eq!(
            config.ingest.routing,
            RoutingTable::new(vec![
                RoutingRule::new(TopicPattern::contains("celsius"), ChannelKind::Temperature),
                RoutingRule::new(TopicPattern::sequence(&["cam", "frame"]), ChannelKind::Image),
            ])
        );
        assert_eq!(config.ingest.routing.classify("shelf/cam/frame"), Some(ChannelKind::Image));
    }

    #[test]
    fn test_storage_paths_resolve_under_data_dir() {
        let config = Config::from_yaml("storage:\n  data_dir: /var/lib/fruiture\n  images: frames\n").unwrap();
        assert_eq!(config.storage.images_dir(), PathBuf::from("/var/lib/fruiture/frames"));
        assert_eq!(config.storage.snapshot_path(), PathBuf::from("/var/lib/fruiture/ml_input.json"));

        let summarizer = config.summary.summarizer_config(&config.storage);
        assert_eq!(summarizer.history_path, Some(PathBuf::from("/var/lib/fruiture/prediction_history.csv")));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/fruiture.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fruiture.yaml"));
    }
}
