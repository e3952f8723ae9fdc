//! Worker wiring for the collector daemon
//!
//! ## Overview
//!
//! ```text
//! MqttEventLoop ──mpsc──► ingestion worker ──spawn_blocking──► IngestStage::handle
//!                                                               route ─► aggregate ─► sensor log
//!
//! interval ──► summary worker ──spawn_blocking──► Summarizer::tick
//!                    ├──► summary topic, actuation topic
//!                    └──► Telegram (spawn_blocking)
//! ```
//!
//! The ingestion worker awaits each message before taking the next, so
//! updates reach the aggregator in delivery order. Image decoding runs on the
//! blocking pool, never on the event loop's thread.
//!
//! The summary worker reads the persisted records, not the aggregator, and
//! so never contends for the in-flight record's lock.

use crate::config::{Config, MqttSection, StorageConfig};
use anyhow::{Context, Result};
use fruiture_connectors::{AsyncConnector, MqttConnector, TelegramCredentials, TelegramNotifier};
use fruiture_core::time::FILE_STAMP_FORMAT;
use fruiture_core::{
    Aggregator, CsvRecordStore, CsvSensorLog, FsBlobStore, InboundMessage, IngestError, IngestionRouter, MergeOutcome,
    SystemTime, TimeSource, Timestamp,
};
use fruiture_ml::{ModelState, Summarizer, TickReport};
use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio::{signal, task};

/// Routing, aggregation and the sensor log for one stream
pub struct IngestStage {
    router: IngestionRouter,
    aggregator: Aggregator,
    sensor_log: Option<CsvSensorLog>,
}

impl IngestStage {
    pub fn new(router: IngestionRouter, aggregator: Aggregator) -> Self {
        Self {
            router,
            aggregator,
            sensor_log: None,
        }
    }

    pub fn with_sensor_log(mut self, sensor_log: CsvSensorLog) -> Self {
        self.sensor_log = Some(sensor_log);
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Route and merge one message. Failures are logged here and yield `None`.
    pub fn handle(&self, message: &InboundMessage) -> Option<MergeOutcome> {
        let update = match self.router.route(message) {
            Ok(update) => update,
            Err(IngestError::Unrouted(topic)) => {
                debug!("Ignoring message on {topic}");
                return None;
            }
            Err(e) => {
                warn!("Dropped message on {}: {e}", message.topic);
                return None;
            }
        };

        // A record lost to a persistence failure was still merged
        let (outcome, merged) = match self.aggregator.apply(&update) {
            Ok(outcome) => {
                let merged = outcome.record().cloned();
                (Some(outcome), merged)
            }
            Err(e) => {
                warn!("{e}");
                (None, Some(e.record().clone()))
            }
        };

        if update.kind().is_diagnostic() {
            info!("{} reading on {}: {}", update.kind(), message.topic, message.payload_text().trim());
        } else if let (Some(log), Some(record)) = (&self.sensor_log, &merged) {
            if update.kind().is_scalar() {
                if let Err(e) = log.append(&record.scalars()) {
                    warn!("Sensor log write failed: {e}");
                }
            }
        }
        outcome
    }
}

/// Drain `messages` through `stage` until every sender is gone
pub async fn run_ingestion(mut messages: mpsc::Receiver<InboundMessage>, stage: Arc<IngestStage>) {
    while let Some(message) = messages.recv().await {
        let stage = stage.clone();
        if let Err(e) = task::spawn_blocking(move || stage.handle(&message)).await {
            warn!("Ingestion task failed: {e}");
        }
    }
    info!("Ingestion channel closed");
}

/// Outbound topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub summary: String,
    pub actuation: String,
}

impl From<&MqttSection> for Topics {
    fn from(section: &MqttSection) -> Self {
        Self {
            summary: section.summary_topic.clone(),
            actuation: section.actuation_topic.clone(),
        }
    }
}

/// Publish the summary and, when it passed the gate, the actuation command
pub async fn publish_report<C>(connector: &mut C, topics: &Topics, report: &TickReport)
where
    C: AsyncConnector,
    C::Error: fmt::Display,
{
    match serde_json::to_vec(&report.summary) {
        Ok(payload) => {
            if let Err(e) = connector.send(&topics.summary, &payload).await {
                warn!("Summary publish to {} failed: {e}", topics.summary);
            }
        }
        Err(e) => warn!("Summary not serializable: {e}"),
    }

    let Some(command) = &report.actuation else { return };
    match serde_json::to_vec(command) {
        Ok(payload) => match connector.send(&topics.actuation, &payload).await {
            Ok(()) => info!("Servo angle {} published to {}", command.servo_angle, topics.actuation),
            Err(e) => warn!("Actuation publish to {} failed: {e}", topics.actuation),
        },
        Err(e) => warn!("Actuation command not serializable: {e}"),
    }
}

/// Timer-driven summary, publish and alert loop
pub struct SummaryWorker<C> {
    summarizer: Arc<Summarizer>,
    connector: C,
    topics: Topics,
    notifier: Option<TelegramNotifier>,
    interval: Duration,
}

impl<C> SummaryWorker<C>
where
    C: AsyncConnector,
    C::Error: fmt::Display,
{
    pub fn new(summarizer: Arc<Summarizer>, connector: C, topics: Topics, interval: Duration) -> Self {
        Self {
            summarizer,
            connector,
            topics,
            notifier: None,
            interval,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<TelegramNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Tick every interval, the first one interval after start
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await;
        loop {
            timer.tick().await;
            self.tick().await;
        }
    }

    /// One summary with its side effects
    pub async fn tick(&mut self) -> Option<TickReport> {
        let summarizer = self.summarizer.clone();
        let report = match task::spawn_blocking(move || summarizer.tick(SystemTime.now())).await {
            Ok(report) => report?,
            Err(e) => {
                warn!("Summary task failed: {e}");
                return None;
            }
        };

        publish_report(&mut self.connector, &self.topics, &report).await;
        if let (Some(alert), Some(notifier)) = (&report.alert, &self.notifier) {
            let text = alert.markdown();
            let notifier = notifier.clone();
            match task::spawn_blocking(move || notifier.notify(&text)).await {
                Ok(0) => warn!("Alert for day {} reached no chat", alert.day),
                Ok(delivered) => info!("Alert for day {} sent to {delivered} chat(s)", alert.day),
                Err(e) => warn!("Alert task failed: {e}"),
            }
        }
        Some(report)
    }
}

/// Telegram notifier from a credentials file; alerts are off without one
pub fn load_notifier(credentials: &Path) -> Option<TelegramNotifier> {
    let credentials = match TelegramCredentials::load(credentials) {
        Ok(credentials) => credentials,
        Err(e) => {
            info!("Telegram alerts disabled: {e}");
            return None;
        }
    };
    match TelegramNotifier::new(credentials) {
        Ok(notifier) => Some(notifier),
        Err(e) => {
            warn!("Telegram alerts disabled: {e}");
            None
        }
    }
}

/// Create the data directory and set aside a previous run's records
pub fn prepare_storage(storage: &StorageConfig, started: Timestamp) -> Result<()> {
    fs::create_dir_all(&storage.data_dir)
        .with_context(|| format!("Failed to create {}", storage.data_dir.display()))?;

    let records = storage.records_path();
    if !storage.resume && records.exists() {
        let archived = records.with_extension(format!("{}.csv", started.format(FILE_STAMP_FORMAT)));
        fs::rename(&records, &archived)
            .with_context(|| format!("Failed to move {} aside", records.display()))?;
        info!("Previous records moved to {}", archived.display());
    }
    Ok(())
}

/// Run the collector until interrupted
pub async fn run(config: Config) -> Result<()> {
    prepare_storage(&config.storage, SystemTime.now())?;

    let records = Arc::new(CsvRecordStore::new(config.storage.records_path()));
    let router = IngestionRouter::new(
        config.ingest.routing.clone(),
        config.ingest.strategy.build(config.ingest.annotate),
    )
    .with_blob_store(Arc::new(FsBlobStore::new(config.storage.images_dir())));
    let aggregator = Aggregator::new(config.ingest.aggregator_config()?, records.clone());
    let stage = Arc::new(
        IngestStage::new(router, aggregator).with_sensor_log(CsvSensorLog::new(config.storage.sensor_log_path())),
    );

    let model = ModelState::load(&config.summary.model_path, &config.summary.scaler_path);
    let summarizer = Summarizer::new(records, model)
        .with_config(config.summary.summarizer_config(&config.storage))
        .with_alert_policy(config.alert.policy);

    let (connector, events) = MqttConnector::new(&config.mqtt.broker);
    let (sender, receiver) = mpsc::channel(config.ingest.channel_capacity);
    let worker = SummaryWorker::new(
        Arc::new(summarizer),
        connector.clone(),
        Topics::from(&config.mqtt),
        Duration::from_secs(config.summary.interval_secs),
    )
    .with_notifier(load_notifier(&config.alert.credentials));

    info!(
        "Collecting from {}:{} ({}), summary every {}s",
        config.mqtt.broker.host, config.mqtt.broker.port, config.mqtt.broker.subscription, config.summary.interval_secs
    );
    let mut mqtt = tokio::spawn(events.run(sender));
    let mut ingestion = tokio::spawn(run_ingestion(receiver, stage.clone()));
    let mut summary = tokio::spawn(worker.run());

    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Interrupted, shutting down"),
            Err(e) => warn!("Signal handler failed, shutting down: {e}"),
        },
        _ = &mut mqtt => warn!("MQTT loop stopped"),
        _ = &mut ingestion => warn!("Ingestion worker stopped"),
        _ = &mut summary => warn!("Summary worker stopped"),
    }

    if let Err(e) = connector.disconnect().await {
        debug!("Disconnect request not queued: {e}");
    }
    summary.abort();
    ingestion.abort();
    mqtt.abort();

    let pending = stage.aggregator().reset();
    if !pending.is_empty() {
        info!("Discarded incomplete record, still missing {:?}", stage.aggregator().config().required.missing(&pending));
    }
    Ok(())
}
