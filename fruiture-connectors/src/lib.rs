//! Transport Connectors for Fruiture
//!
//! ## Overview
//!
//! The core engine never touches the network. This crate carries messages
//! across the process boundary in both directions:
//!
//! | Direction | Protocol | Type | Carries |
//! |-----------|----------|------|---------|
//! | inbound   | MQTT     | [`mqtt::MqttEventLoop`] | sensor readings and camera frames |
//! | outbound  | MQTT     | [`mqtt::MqttConnector`] | summaries and actuation commands |
//! | outbound  | HTTP     | [`http::HttpConnector`] | JSON requests |
//! | outbound  | HTTP     | [`telegram::TelegramNotifier`] | shelf-life alerts |
//!
//! ## Inbound Flow
//!
//! ```text
//! broker ──► EventLoop::poll ──► InboundMessage ──► mpsc::Sender ──► ingestion worker
//!               │
//!               └── transport error: log, wait, poll again (reconnects)
//! ```
//!
//! Messages are stamped with their receipt time as they leave the event
//! loop. The channel is bounded; a slow consumer applies backpressure to the
//! event loop rather than growing memory.
//!
//! ## Failure Model
//!
//! Every outbound send is best-effort. Callers log the returned error and
//! continue; nothing here retries forever or panics.
//!
//! ## Example Usage
//!
//! ```no_run
//! use fruiture_connectors::mqtt::{MqttConfig, MqttConnector};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), fruiture_connectors::MqttError> {
//! let (connector, events) = MqttConnector::new(&MqttConfig::default());
//! let (tx, mut rx) = mpsc::channel(64);
//! tokio::spawn(events.run(tx));
//!
//! while let Some(message) = rx.recv().await {
//!     println!("{} ({} bytes)", message.topic, message.payload.len());
//! }
//! connector.publish_json("fruiture/ml_input", &serde_json::json!({"record_count": 0})).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod telegram;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttConnector, MqttError, MqttEventLoop, QoS};

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpConnector, HttpError};

#[cfg(feature = "http")]
pub use telegram::{TelegramCredentials, TelegramNotifier};

use thiserror::Error;

/// Failures shared by every transport
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Timeout")]
    Timeout,

    #[error("Connector misconfigured: {0}")]
    ConfigError(String),
}

/// Outbound transport that blocks the calling thread
pub trait Connector {
    type Error;

    /// Deliver `data` to `topic`, a path or topic name
    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;
}

/// Outbound transport driven from async code
#[async_trait::async_trait]
pub trait AsyncConnector: Send {
    type Error;

    /// Queue `data` for `topic`
    async fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Whether the last broker handshake succeeded
    fn is_connected(&self) -> bool;

    fn stats(&self) -> ConnectionStats;
}

/// Counters kept by each connector since it was created
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectionStats {
    pub messages_sent: u64,
    pub messages_failed: u64,
    /// Publishes forwarded from the broker
    pub messages_received: u64,
    /// Publishes dropped because the ingestion channel was full
    pub messages_dropped: u64,
    /// Payload bytes of successful sends
    pub bytes_sent: u64,
    /// Transport errors seen by the event loop
    pub reconnections: u32,
    pub last_error: Option<String>,
}

impl ConnectionStats {
    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub(crate) fn record_failure(&mut self, error: impl ToString) {
        self.messages_failed += 1;
        self.last_error = Some(error.to_string());
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = ConnectionStats::default();
        stats.record_sent(10);
        stats.record_sent(5);
        stats.record_failure("broker gone");
        assert_eq!((stats.messages_sent, stats.bytes_sent, stats.messages_failed), (2, 15, 1));
        assert_eq!(stats.last_error.as_deref(), Some("broker gone"));
    }
}
