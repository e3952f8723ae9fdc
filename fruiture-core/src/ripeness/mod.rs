//! Ripeness Estimation from Camera Frames
//!
//! ## Overview
//!
//! Turns a raw camera frame into a ripeness score (0-100), a representative
//! peel colour and the share of each colour class. Estimation is a pure
//! function of the frame: no shared state, no dependency on the aggregator.
//!
//! Two strategies sit behind [`RipenessEstimator`]:
//!
//! | Strategy | Object mask | Colour | Score |
//! |----------|-------------|--------|-------|
//! | [`SegmentationEstimator`] | HSV class masks, morphology, largest contour | median under contour | weighted class shares |
//! | [`HueEstimator`] | non-gray pixels | median of non-gray pixels | hue distance from green |
//!
//! ## Segmentation Pipeline
//!
//! ```text
//! RGB ─► HSV ─► blur ─► equalize V ─► class masks ─┬─► union ─► minus gray
//!                                                  │              │
//!                                                  │      close ─► open ─► smooth
//!                                                  │                         │
//!                                                  │            largest external contour
//!                                                  │                         │
//!                                                  │              polygon approx ─► fill
//!                                                  ▼                         │
//!                                   class ∩ fill / union  ◄──────────────────┘
//! ```
//!
//! ## Score
//!
//! ```text
//! ripeness = round(0.0·green% + 0.3·yellow% + 0.7·brown% + 1.0·black%)
//! ```
//! computed on proportions rounded to 0.1 %, rounding half up, clamped to
//! [0, 100].

mod annotate;
mod contour;
mod equalize;
mod hsv;
mod hue;
mod mask;
mod segmentation;

pub use hsv::{rgb_to_hsv, rgb_to_hsv_unit};
pub use hue::{rgb_to_ripeness, HueEstimator};
pub use segmentation::SegmentationEstimator;

use crate::constants::ripeness::RIPENESS_WEIGHTS_TENTHS;
use crate::errors::{RipenessError, RipenessResult};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Representative peel colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Ripeness colour classes, from unripe to spoiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorClass {
    Green,
    Yellow,
    Brown,
    Black,
}

impl ColorClass {
    /// All classes in score-weight order
    pub const ALL: [ColorClass; 4] = [
        ColorClass::Green,
        ColorClass::Yellow,
        ColorClass::Brown,
        ColorClass::Black,
    ];

    /// Label used in logs and column names
    pub const fn label(&self) -> &'static str {
        match self {
            ColorClass::Green => "green",
            ColorClass::Yellow => "yellow",
            ColorClass::Brown => "brown",
            ColorClass::Black => "black",
        }
    }

    pub(crate) const fn index(&self) -> usize {
        match self {
            ColorClass::Green => 0,
            ColorClass::Yellow => 1,
            ColorClass::Brown => 2,
            ColorClass::Black => 3,
        }
    }
}

/// Percentage of foreground pixels per colour class.
///
/// Shares need not sum to 100: classes overlap and pixels outside the final
/// contour are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorProportions {
    pub green: f64,
    pub yellow: f64,
    pub brown: f64,
    pub black: f64,
}

impl ColorProportions {
    pub fn new(green: f64, yellow: f64, brown: f64, black: f64) -> Self {
        Self { green, yellow, brown, black }
    }

    pub fn get(&self, class: ColorClass) -> f64 {
        match class {
            ColorClass::Green => self.green,
            ColorClass::Yellow => self.yellow,
            ColorClass::Brown => self.brown,
            ColorClass::Black => self.black,
        }
    }

    /// Iterate `(class, percent)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (ColorClass, f64)> + '_ {
        ColorClass::ALL.iter().map(move |&class| (class, self.get(class)))
    }
}

/// Weighted ripeness score of a set of class proportions.
///
/// Proportions are taken at 0.1 % resolution so the blend is exact integer
/// arithmetic: `round(36.5) == 37`.
pub fn ripeness_score(proportions: &ColorProportions) -> u8 {
    let weighted: i64 = proportions
        .iter()
        .map(|(class, percent)| {
            let tenths = (percent * 10.0).round() as i64;
            RIPENESS_WEIGHTS_TENTHS[class.index()] * tenths.max(0)
        })
        .sum();
    // weighted is the score in hundredths
    ((weighted + 50) / 100).clamp(0, 100) as u8
}

/// Output of a successful estimation
#[derive(Debug, Clone)]
pub struct Estimate {
    /// Filled object mask (255 = object)
    pub mask: GrayImage,
    /// Per-channel median colour under the mask
    pub mean_color: RgbColor,
    /// Score 0-100; unset when no foreground was measured
    pub ripeness: Option<u8>,
    /// Class shares; unset when no foreground was measured
    pub proportions: Option<ColorProportions>,
    /// Diagnostic copy of the frame with the detection drawn on it
    pub annotated: Option<RgbImage>,
}

/// A ripeness estimation strategy
pub trait RipenessEstimator: Send + Sync {
    /// Estimate ripeness of the dominant object in `frame`
    fn estimate(&self, frame: &RgbImage) -> RipenessResult<Estimate>;

    /// Strategy name for logs
    fn name(&self) -> &'static str;
}

/// Strategy selector for configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorStrategy {
    /// Full colour segmentation with class proportions
    #[default]
    Segmentation,
    /// Hue of the median non-gray colour only
    Hue,
}

impl EstimatorStrategy {
    /// Build the estimator for this strategy
    pub fn build(self, annotate: bool) -> Box<dyn RipenessEstimator> {
        match self {
            EstimatorStrategy::Segmentation => Box::new(SegmentationEstimator::new().with_annotation(annotate)),
            EstimatorStrategy::Hue => Box::new(HueEstimator::new()),
        }
    }
}

/// Decode a compressed frame (JPEG, PNG) into RGB
pub fn decode_frame(bytes: &[u8]) -> RipenessResult<RgbImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| RipenessError::Decode(e.to_string()))
}

/// Per-channel median of a set of pixels.
///
/// An even count averages the two middle values and truncates.
pub(crate) fn channel_median<'a, I>(pixels: I) -> Option<RgbColor>
where
    I: Iterator<Item = &'a image::Rgb<u8>>,
{
    let mut histograms = [[0u32; 256]; 3];
    let mut count = 0u32;
    for pixel in pixels {
        for (channel, histogram) in histograms.iter_mut().enumerate() {
            histogram[pixel.0[channel] as usize] += 1;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }

    let nth = |histogram: &[u32; 256], rank: u32| -> u32 {
        let mut seen = 0;
        for (value, &n) in histogram.iter().enumerate() {
            seen += n;
            if seen > rank {
                return value as u32;
            }
        }
        255
    };
    let median = |histogram: &[u32; 256]| -> u8 {
        if count % 2 == 1 {
            nth(histogram, count / 2) as u8
        } else {
            ((nth(histogram, count / 2 - 1) + nth(histogram, count / 2)) / 2) as u8
        }
    };

    Some(RgbColor::new(
        median(&histograms[0]),
        median(&histograms[1]),
        median(&histograms[2]),
    ))
}
