//! Hue-distance ripeness strategy
//!
//! Coarse and stateless: the frame is reduced to the median colour of its
//! saturated pixels and that colour's hue is mapped linearly from green
//! (120°, unripe) to red (0°, fully ripe). No class proportions are produced.

use super::hsv::{rgb_to_hsv, rgb_to_hsv_unit};
use super::{channel_median, Estimate, RipenessEstimator};
use crate::constants::ripeness::{GRAY_SATURATION_MAX, HUE_UNRIPE_DEGREES};
use crate::errors::{RipenessError, RipenessResult};
use image::{GrayImage, Luma, RgbImage};

/// Ripeness in `[0, 1]` of a single colour by its hue.
///
/// Pure green maps to 0.0; hue 0° maps to 1.0. Hues past green (cyan, blue,
/// magenta) clamp to 0.0.
pub fn rgb_to_ripeness(r: u8, g: u8, b: u8) -> f64 {
    let (hue, _, _) = rgb_to_hsv_unit(r, g, b);
    let degrees = hue * 360.0;
    ((HUE_UNRIPE_DEGREES - degrees) / HUE_UNRIPE_DEGREES).clamp(0.0, 1.0)
}

/// Median-hue estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct HueEstimator;

impl HueEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl RipenessEstimator for HueEstimator {
    fn estimate(&self, frame: &RgbImage) -> RipenessResult<Estimate> {
        let mask = GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let [r, g, b] = frame.get_pixel(x, y).0;
            if rgb_to_hsv(r, g, b)[1] > GRAY_SATURATION_MAX { Luma([255]) } else { Luma([0]) }
        });

        let colour = channel_median(
            frame
                .pixels()
                .zip(mask.pixels())
                .filter(|(_, m)| m.0[0] > 0)
                .map(|(p, _)| p),
        )
        .ok_or(RipenessError::NoBananaDetected)?;

        let score = (100.0 * rgb_to_ripeness(colour.r, colour.g, colour.b)).round() as u8;

        Ok(Estimate {
            mask,
            mean_color: colour,
            ripeness: Some(score),
            proportions: None,
            annotated: None,
        })
    }

    fn name(&self) -> &'static str {
        "hue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ripeness::RgbColor;
    use image::Rgb;

    #[test]
    fn hue_end_points() {
        assert_eq!(rgb_to_ripeness(0, 255, 0), 0.0);
        assert_eq!(rgb_to_ripeness(255, 0, 0), 1.0);
        assert_eq!(rgb_to_ripeness(0, 0, 255), 0.0);
    }

    #[test]
    fn yellow_is_half_way() {
        // hue 60° sits half way between green and red
        assert!((rgb_to_ripeness(255, 255, 0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn gray_frame_has_nothing_to_measure() {
        let frame = RgbImage::from_pixel(32, 32, Rgb([120, 120, 120]));
        assert_eq!(HueEstimator::new().estimate(&frame).unwrap_err(), RipenessError::NoBananaDetected);
    }

    #[test]
    fn background_is_ignored() {
        let frame = RgbImage::from_fn(32, 32, |x, _| if x < 8 { Rgb([255, 255, 0]) } else { Rgb([200, 200, 200]) });
        let estimate = HueEstimator::new().estimate(&frame).unwrap();
        assert_eq!(estimate.mean_color, RgbColor::new(255, 255, 0));
        assert_eq!(estimate.ripeness, Some(50));
        assert!(estimate.proportions.is_none());
    }
}
