//! MQTT connector for Fruiture
//!
//! Built on `rumqttc`'s async client. [`MqttConnector::new`] returns two
//! halves:
//!
//! - [`MqttConnector`]: cheap to clone, publishes summaries and commands
//! - [`MqttEventLoop`]: must be polled; subscribes on every (re)connect and
//!   forwards publishes into the ingestion channel
//!
//! Subscribing on `ConnAck` rather than once up front means a reconnect
//! after a broker restart restores the subscription.
//!
//! The event loop never waits on the ingestion channel. When the channel is
//! full (a slow frame is still being segmented) the publish is dropped with a
//! warning and counted in [`ConnectionStats::messages_dropped`], so keep-alive
//! pings keep flowing. QoS 0 delivery already allows such loss; size
//! `ingest.channel_capacity` for the expected burst.

use crate::{AsyncConnector, ConnectionStats, ConnectorError};
use fruiture_core::constants::pipeline::{
    DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT, DEFAULT_SUBSCRIPTION, KEEP_ALIVE_SECS, RECONNECT_DELAY_SECS,
};
use fruiture_core::{InboundMessage, SystemTime, TimeSource, Timestamp};
use log::{debug, info, warn};
use rumqttc::{AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub use rumqttc::QoS;

/// Requests buffered between the client handle and the event loop
const REQUEST_CAPACITY: usize = 16;

/// MQTT-specific errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Topic filter covering every device channel
    pub subscription: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
    /// Largest packet accepted or sent; camera frames need headroom
    pub max_packet_bytes: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            client_id: format!("fruiture-{}", std::process::id()),
            subscription: DEFAULT_SUBSCRIPTION.to_string(),
            keep_alive_secs: KEEP_ALIVE_SECS,
            reconnect_delay_secs: RECONNECT_DELAY_SECS,
            max_packet_bytes: 1024 * 1024,
        }
    }
}

impl MqttConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = subscription.into();
        self
    }

    pub(crate) fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options
            .set_keep_alive(Duration::from_secs(self.keep_alive_secs.max(5)))
            .set_max_packet_size(self.max_packet_bytes, self.max_packet_bytes);
        options
    }
}

/// Publishing half
#[derive(Clone)]
pub struct MqttConnector {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    stats: Arc<Mutex<ConnectionStats>>,
}

/// Polling half
pub struct MqttEventLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    config: MqttConfig,
    connected: Arc<AtomicBool>,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl MqttConnector {
    /// Create the client; nothing connects until the event loop is polled
    pub fn new(config: &MqttConfig) -> (Self, MqttEventLoop) {
        let (client, eventloop) = AsyncClient::new(config.options(), REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(ConnectionStats::default()));

        let connector = Self {
            client: client.clone(),
            connected: connected.clone(),
            stats: stats.clone(),
        };
        let events = MqttEventLoop {
            eventloop,
            client,
            config: config.clone(),
            connected,
            stats,
        };
        (connector, events)
    }

    /// Publish `value` as JSON at QoS 0
    pub async fn publish_json<T: Serialize>(&self, topic: &str, value: &T) -> Result<(), MqttError> {
        let payload = serde_json::to_vec(value).map_err(|e| MqttError::Serialization(e.to_string()))?;
        self.publish(topic, payload).await
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        let len = payload.len();
        match self.client.publish(topic, QoS::AtMostOnce, false, payload).await {
            Ok(()) => {
                self.lock_stats().record_sent(len);
                Ok(())
            }
            Err(e) => {
                self.lock_stats().record_failure(&e);
                Err(e.into())
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), MqttError> {
        Ok(self.client.disconnect().await?)
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, ConnectionStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl AsyncConnector for MqttConnector {
    type Error = MqttError;

    async fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.publish(topic, data.to_vec()).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn stats(&self) -> ConnectionStats {
        self.lock_stats().clone()
    }
}

impl MqttEventLoop {
    /// Poll forever, forwarding publishes to `sink`.
    ///
    /// Transport errors are logged and retried after the reconnect delay.
    /// Returns once the receiving side of `sink` is dropped.
    pub async fn run(mut self, sink: mpsc::Sender<InboundMessage>) {
        let delay = Duration::from_secs(self.config.reconnect_delay_secs);
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connected.store(true, Ordering::Relaxed);
                    info!("Connected to {}:{}", self.config.host, self.config.port);
                    if let Err(e) = self.client.try_subscribe(&self.config.subscription, QoS::AtMostOnce) {
                        warn!("Subscribe to {} failed: {e}", self.config.subscription);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.stats.lock().unwrap_or_else(PoisonError::into_inner).messages_received += 1;
                    let message = inbound_message(&publish, SystemTime.now());
                    debug!("Received {} ({} bytes)", message.topic, message.payload.len());
                    match forward(&sink, message) {
                        Forwarded::Queued => {}
                        Forwarded::Dropped(topic) => {
                            self.stats.lock().unwrap_or_else(PoisonError::into_inner).messages_dropped += 1;
                            warn!("Ingestion channel full, dropped message on {topic}");
                        }
                        Forwarded::Closed => {
                            info!("Ingestion channel closed, stopping MQTT loop");
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::Relaxed);
                    {
                        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
                        stats.reconnections += 1;
                        stats.last_error = Some(e.to_string());
                    }
                    warn!("MQTT disconnected, retrying in {}s: {e}", delay.as_secs());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Poll until every queued publish has been written, or `timeout` passes
    pub async fn flush(mut self, pending: usize, timeout: Duration) -> Result<(), MqttError> {
        let drive = async {
            let mut written = 0;
            while written < pending {
                if let Event::Outgoing(Outgoing::Publish(_)) = self.eventloop.poll().await? {
                    written += 1;
                }
            }
            Ok::<(), MqttError>(())
        };
        tokio::time::timeout(timeout, drive)
            .await
            .map_err(|_| MqttError::Connector(ConnectorError::Timeout))?
    }
}

/// What became of a message handed to the ingestion channel
#[derive(Debug, PartialEq, Eq)]
enum Forwarded {
    Queued,
    /// Channel full; carries the topic of the dropped message
    Dropped(String),
    Closed,
}

fn forward(sink: &mpsc::Sender<InboundMessage>, message: InboundMessage) -> Forwarded {
    match sink.try_send(message) {
        Ok(()) => Forwarded::Queued,
        Err(mpsc::error::TrySendError::Full(message)) => Forwarded::Dropped(message.topic),
        Err(mpsc::error::TrySendError::Closed(_)) => Forwarded::Closed,
    }
}

/// Publish one payload on a short-lived connection
pub async fn publish_once(config: &MqttConfig, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
    let (connector, events) = MqttConnector::new(config);
    connector.publish(topic, payload).await?;
    events
        .flush(1, Duration::from_secs(config.keep_alive_secs.max(5)))
        .await?;
    Ok(())
}

/// Convert a received publish into the core's inbound message
pub fn inbound_message(publish: &Publish, received_at: Timestamp) -> InboundMessage {
    InboundMessage::new(publish.topic.clone(), publish.payload.to_vec(), received_at)
}
