//! Ingestion Router
//!
//! Turns an [`InboundMessage`] into a typed [`FieldUpdate`]:
//!
//! ```text
//! topic ──classify──► scalar channel ──first numeric token──► FieldPayload::{Temperature,..}
//!                 └─► image channel  ──base64──► decode ──► estimate ──► archive
//!                                                           └──────────► FieldPayload::Image
//! ```
//!
//! Routing is stateless and may run on any thread; the slow image work
//! happens here, before the aggregator's lock is ever taken. A frame that
//! fails to decode or contains no banana is dropped whole: no blob is
//! archived and no image field is produced.

use crate::errors::{IngestError, RipenessError};
use crate::events::{ChannelKind, FieldPayload, FieldUpdate, ImageObservation, InboundMessage};
use crate::ripeness::{decode_frame, RipenessEstimator};
use crate::routing::{first_numeric_token, RoutingTable};
use crate::storage::BlobStore;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use log::debug;
use std::sync::Arc;

/// Standard alphabet, padding optional
const FRAME_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Classifies topics and prepares typed field updates
pub struct IngestionRouter {
    routing: RoutingTable,
    estimator: Box<dyn RipenessEstimator>,
    blobs: Option<Arc<dyn BlobStore>>,
}

impl IngestionRouter {
    pub fn new(routing: RoutingTable, estimator: Box<dyn RipenessEstimator>) -> Self {
        Self {
            routing,
            estimator,
            blobs: None,
        }
    }

    /// Archive every accepted frame in `blobs`
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Channel `topic` routes to, if any
    pub fn classify(&self, topic: &str) -> Option<ChannelKind> {
        self.routing.classify(topic)
    }

    pub fn route(&self, message: &InboundMessage) -> Result<FieldUpdate, IngestError> {
        let kind = self
            .classify(&message.topic)
            .ok_or_else(|| IngestError::Unrouted(message.topic.clone()))?;

        let payload = if kind.is_scalar() {
            parse_scalar(kind, message)?
        } else {
            FieldPayload::Image(self.process_frame(message)?)
        };
        Ok(FieldUpdate::new(payload, message.received_at))
    }

    fn process_frame(&self, message: &InboundMessage) -> Result<ImageObservation, IngestError> {
        let bytes = decode_base64(&message.payload)?;
        let frame = decode_frame(&bytes)?;
        let estimate = self.estimator.estimate(&frame)?;
        debug!(
            "{} estimate on {}x{} frame: ripeness {:?}",
            self.estimator.name(),
            frame.width(),
            frame.height(),
            estimate.ripeness
        );

        let stored = match &self.blobs {
            Some(blobs) => Some(blobs.store(&bytes, estimate.annotated.as_ref(), message.received_at)?),
            None => None,
        };

        Ok(ImageObservation {
            ripeness: estimate.ripeness,
            mean_color: estimate.mean_color,
            proportions: estimate.proportions,
            image_path: stored.as_ref().map(|s| s.raw.clone()),
            processed_image_path: stored.and_then(|s| s.processed),
        })
    }
}

fn parse_scalar(kind: ChannelKind, message: &InboundMessage) -> Result<FieldPayload, IngestError> {
    let text = message.payload_text();
    first_numeric_token(&text)
        .and_then(|value| FieldPayload::scalar(kind, value))
        .ok_or_else(|| IngestError::Parse {
            channel: kind.name(),
            payload: text.into_owned(),
        })
}

/// Decode a base64 frame; whitespace and a `data:` URI prefix are ignored
fn decode_base64(payload: &[u8]) -> Result<Vec<u8>, RipenessError> {
    let text = String::from_utf8_lossy(payload);
    let body = match text.split_once("base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => text.as_ref(),
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    FRAME_ENGINE
        .decode(compact)
        .map_err(|e| RipenessError::Decode(format!("base64: {e}")))
}
