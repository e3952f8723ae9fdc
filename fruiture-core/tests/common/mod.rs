//! Common test utilities and data generators for integration tests
//!
//! This module provides:
//! - Synthetic banana frames with controllable peel colours
//! - Frame encoders producing transport-ready base64 payloads
//! - A fixed-output estimator for exercising the aggregator end to end
//! - Deterministic message builders stamped from a fixed clock

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fruiture_core::{
    ColorProportions, Estimate, FixedTime, InboundMessage, RgbColor, RipenessEstimator, RipenessResult, TimeSource,
    Timestamp,
};
use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Peel colours that land squarely in one calibrated class each
pub mod peel {
    use image::Rgb;

    pub const GREEN: Rgb<u8> = Rgb([60, 170, 40]);
    pub const YELLOW: Rgb<u8> = Rgb([230, 200, 40]);
    pub const BROWN: Rgb<u8> = Rgb([140, 90, 40]);
    pub const BACKGROUND: Rgb<u8> = Rgb([235, 235, 235]);
}

/// Generator for banana-shaped test frames
pub struct FrameGenerator {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameGenerator {
    fn default() -> Self {
        Self { width: 160, height: 120 }
    }
}

impl FrameGenerator {
    /// Elliptical banana on a light gray background.
    ///
    /// `bands` split the banana left to right; each entry is a peel colour and
    /// its share of the width.
    pub fn banana(&self, bands: &[(Rgb<u8>, f64)]) -> RgbImage {
        let (cx, cy) = (self.width as f64 / 2.0, self.height as f64 / 2.0);
        let (rx, ry) = (self.width as f64 * 0.35, self.height as f64 * 0.2);
        let total: f64 = bands.iter().map(|(_, share)| share).sum();

        RgbImage::from_fn(self.width, self.height, |x, y| {
            let dx = (x as f64 - cx) / rx;
            let dy = (y as f64 - cy) / ry;
            if dx * dx + dy * dy > 1.0 {
                return peel::BACKGROUND;
            }
            let along = (x as f64 - (cx - rx)) / (2.0 * rx) * total;
            let mut edge = 0.0;
            for &(colour, share) in bands {
                edge += share;
                if along < edge {
                    return colour;
                }
            }
            bands.last().map(|(c, _)| *c).unwrap_or(peel::BACKGROUND)
        })
    }

    /// Background only
    pub fn empty(&self) -> RgbImage {
        RgbImage::from_pixel(self.width, self.height, peel::BACKGROUND)
    }
}

/// Encode a frame as PNG bytes
pub fn encode_png(frame: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png encoding");
    bytes
}

/// Encode a frame as the base64 payload the camera publishes
pub fn encode_payload(frame: &RgbImage) -> String {
    STANDARD.encode(encode_png(frame))
}

/// Estimator returning a fixed result regardless of the frame
pub struct FixedEstimator {
    pub ripeness: Option<u8>,
    pub mean_color: RgbColor,
    pub proportions: Option<ColorProportions>,
}

impl FixedEstimator {
    /// The reference observation: ripeness 42, colour (180, 140, 20), 10/70/15/5
    pub fn reference() -> Self {
        Self {
            ripeness: Some(42),
            mean_color: RgbColor::new(180, 140, 20),
            proportions: Some(ColorProportions::new(10.0, 70.0, 15.0, 5.0)),
        }
    }
}

impl RipenessEstimator for FixedEstimator {
    fn estimate(&self, frame: &RgbImage) -> RipenessResult<Estimate> {
        Ok(Estimate {
            mask: GrayImage::new(frame.width(), frame.height()),
            mean_color: self.mean_color,
            ripeness: self.ripeness,
            proportions: self.proportions,
            annotated: None,
        })
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Message builder on a deterministic clock, one second per message
pub struct MessageFeed {
    clock: FixedTime,
}

impl MessageFeed {
    pub fn starting_at(text: &str) -> Self {
        let start = fruiture_core::time::parse_timestamp(text).expect("valid start time");
        Self { clock: FixedTime::new(start) }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Advance the clock one second and return the new time
    pub fn tick(&mut self) -> Timestamp {
        self.clock.advance(1);
        self.clock.now()
    }

    pub fn message(&mut self, topic: &str, payload: impl Into<Vec<u8>>) -> InboundMessage {
        let at = self.tick();
        InboundMessage::new(topic, payload, at)
    }
}

/// Small deterministic RNG for reproducible scenarios
pub struct TestRng {
    state: u64,
}

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        (self.state >> 32) as u32
    }

    pub fn gen_range(&mut self, min: f64, max: f64) -> f64 {
        min + (self.next_u32() as f64 / u32::MAX as f64) * (max - min)
    }
}
