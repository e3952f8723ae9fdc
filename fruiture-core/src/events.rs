//! Event Types for the Ingestion Pipeline
//!
//! ## Overview
//!
//! Messages cross three boundaries on their way into a record:
//!
//! ```text
//! transport ──InboundMessage──► router ──FieldUpdate──► aggregator
//!  (topic, bytes)                 │    (typed payload,
//!                                 │     receipt time)
//!                                 └─► estimator (image channel only)
//! ```
//!
//! - [`InboundMessage`] is what the transport delivered: an opaque topic and
//!   raw payload bytes, stamped with the collector's receipt time.
//! - [`FieldUpdate`] is the router's typed result. Image payloads have
//!   already been decoded, estimated and archived by the time they become a
//!   `FieldUpdate`, so the aggregator never runs slow work under its lock.
//!
//! ## Channel Kinds
//!
//! | Kind | Payload | Record field | Completion check |
//! |------|---------|--------------|------------------|
//! | `Temperature` | number | `temperature` | yes |
//! | `Humidity` | number | `humidity` | yes |
//! | `Gas` | number | `gas` | yes |
//! | `RawGas` | number | none (diagnostic) | no |
//! | `Image` | base64 frame | image-derived fields | yes |

use crate::ripeness::{ColorProportions, RgbColor};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical channel a topic routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Temperature,
    Humidity,
    /// Compensated gas concentration
    Gas,
    /// Uncompensated gas reading, logged but never merged
    RawGas,
    /// Base64-encoded compressed camera frame
    Image,
}

impl ChannelKind {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            ChannelKind::Temperature => "temperature",
            ChannelKind::Humidity => "humidity",
            ChannelKind::Gas => "gas",
            ChannelKind::RawGas => "raw_gas",
            ChannelKind::Image => "image",
        }
    }

    /// Get expected unit of measurement
    pub const fn unit(&self) -> &'static str {
        match self {
            ChannelKind::Temperature => "°C",
            ChannelKind::Humidity => "%",
            ChannelKind::Gas | ChannelKind::RawGas => "ppm",
            ChannelKind::Image => "",
        }
    }

    /// Whether payloads on this channel are a single number
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, ChannelKind::Image)
    }

    /// Diagnostic channels update no field and never complete a record
    pub const fn is_diagnostic(&self) -> bool {
        matches!(self, ChannelKind::RawGas)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A message as delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Opaque topic string
    pub topic: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Collector receipt time
    pub received_at: Timestamp,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, received_at: Timestamp) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at,
        }
    }

    /// Payload as text, invalid UTF-8 replaced
    pub fn payload_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Everything the estimator and the blob store produced for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ImageObservation {
    /// Score 0-100; unset when the frame had no measurable foreground
    pub ripeness: Option<u8>,
    /// Median colour under the object mask
    pub mean_color: RgbColor,
    /// Class shares; unset for the hue strategy
    pub proportions: Option<ColorProportions>,
    /// Reference to the archived raw frame
    pub image_path: Option<String>,
    /// Reference to the archived annotated frame
    pub processed_image_path: Option<String>,
}

/// Typed payload of a routed message
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPayload {
    Temperature(f64),
    Humidity(f64),
    Gas(f64),
    RawGas(f64),
    Image(ImageObservation),
}

impl FieldPayload {
    /// Channel this payload belongs to
    pub const fn kind(&self) -> ChannelKind {
        match self {
            FieldPayload::Temperature(_) => ChannelKind::Temperature,
            FieldPayload::Humidity(_) => ChannelKind::Humidity,
            FieldPayload::Gas(_) => ChannelKind::Gas,
            FieldPayload::RawGas(_) => ChannelKind::RawGas,
            FieldPayload::Image(_) => ChannelKind::Image,
        }
    }

    /// Build a scalar payload for `kind`; `None` for the image channel
    pub const fn scalar(kind: ChannelKind, value: f64) -> Option<Self> {
        match kind {
            ChannelKind::Temperature => Some(FieldPayload::Temperature(value)),
            ChannelKind::Humidity => Some(FieldPayload::Humidity(value)),
            ChannelKind::Gas => Some(FieldPayload::Gas(value)),
            ChannelKind::RawGas => Some(FieldPayload::RawGas(value)),
            ChannelKind::Image => None,
        }
    }
}

/// A typed update for the in-flight record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub payload: FieldPayload,
    /// Collector receipt time of the originating message
    pub received_at: Timestamp,
}

impl FieldUpdate {
    pub fn new(payload: FieldPayload, received_at: Timestamp) -> Self {
        Self { payload, received_at }
    }

    pub const fn kind(&self) -> ChannelKind {
        self.payload.kind()
    }
}
