//! Colour-segmentation ripeness strategy
//!
//! Finds the dominant banana-coloured blob, samples the original pixels under
//! its simplified outline and scores the share of each colour class. See the
//! module-level pipeline diagram for the order of operations; the order is
//! significant (equalization before thresholding, gray rejection before
//! morphology, smoothing before tracing).

use super::annotate::annotate;
use super::contour::{approx_poly_dp, arc_length, contour_area, external_contours, fill_polygon};
use super::equalize::clahe;
use super::hsv::to_hsv_image;
use super::mask::{
    close, count_nonzero, count_overlap, ellipse_kernel, gray, in_range, open, smooth_threshold, subtract, union,
};
use super::{channel_median, ripeness_score, ColorClass, ColorProportions, Estimate, RipenessEstimator};
use crate::constants::ripeness::*;
use crate::errors::{RipenessError, RipenessResult};
use image::{imageops, GrayImage, Luma, RgbImage};
use log::debug;

/// Calibrated HSV range of a colour class
pub fn class_range(class: ColorClass) -> &'static HsvRange {
    match class {
        ColorClass::Green => &GREEN_RANGE,
        ColorClass::Yellow => &YELLOW_RANGE,
        ColorClass::Brown => &BROWN_RANGE,
        ColorClass::Black => &BLACK_RANGE,
    }
}

/// Segmentation estimator with optional diagnostic overlay
#[derive(Debug, Clone)]
pub struct SegmentationEstimator {
    annotate: bool,
    min_area: f64,
}

impl Default for SegmentationEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentationEstimator {
    pub fn new() -> Self {
        Self {
            annotate: false,
            min_area: MIN_CONTOUR_AREA_PX,
        }
    }

    /// Produce an annotated copy of each frame
    pub fn with_annotation(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Override the minimum accepted contour area (px²)
    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    /// HSV frame, blurred, with the value channel equalized
    fn prepare(frame: &RgbImage) -> RgbImage {
        let mut hsv = imageops::blur(&to_hsv_image(frame), HSV_BLUR_SIGMA);

        let value = GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| Luma([hsv.get_pixel(x, y).0[2]]));
        let value = clahe(&value, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID);
        for (pixel, v) in hsv.pixels_mut().zip(value.pixels()) {
            pixel.0[2] = v.0[0];
        }
        hsv
    }
}

impl RipenessEstimator for SegmentationEstimator {
    fn estimate(&self, frame: &RgbImage) -> RipenessResult<Estimate> {
        let (width, height) = frame.dimensions();
        let hsv = Self::prepare(frame);

        let class_masks = ColorClass::ALL.map(|class| in_range(&hsv, class_range(class)));
        let combined = class_masks[1..]
            .iter()
            .fold(class_masks[0].clone(), |acc, mask| union(&acc, mask));
        let combined = subtract(&combined, &gray(&hsv, GRAY_SATURATION_MAX));

        let kernel = ellipse_kernel(MORPH_KERNEL_SIZE);
        let combined = open(&close(&combined, &kernel, MORPH_ITERATIONS), &kernel, MORPH_ITERATIONS);
        let smoothed = smooth_threshold(&combined, MASK_BLUR_SIGMA, MASK_THRESHOLD);

        let (area, contour) = external_contours(&smoothed)
            .into_iter()
            .map(|c| (contour_area(&c), c))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .ok_or(RipenessError::NoBananaDetected)?;
        if area < self.min_area {
            debug!("Largest contour {area:.0}px² below {:.0}px²", self.min_area);
            return Err(RipenessError::NoBananaDetected);
        }

        let polygon = approx_poly_dp(&contour, POLY_EPSILON_FACTOR * arc_length(&contour));
        let fill = fill_polygon(width, height, &polygon);

        let mean_color = channel_median(
            frame
                .pixels()
                .zip(fill.pixels())
                .filter(|(_, m)| m.0[0] > 0)
                .map(|(p, _)| p),
        )
        .ok_or(RipenessError::NoBananaDetected)?;

        let total = count_nonzero(&combined);
        let proportions = (total > 0).then(|| {
            let share = |class: ColorClass| {
                let inside = count_overlap(&class_masks[class.index()], &fill);
                (inside as f64 / total as f64 * 1000.0).round() / 10.0
            };
            ColorProportions::new(
                share(ColorClass::Green),
                share(ColorClass::Yellow),
                share(ColorClass::Brown),
                share(ColorClass::Black),
            )
        });
        let ripeness = proportions.as_ref().map(ripeness_score);

        debug!(
            "Contour {area:.0}px², {} vertices, median {mean_color}, ripeness {ripeness:?}",
            polygon.len()
        );

        Ok(Estimate {
            mask: fill,
            mean_color,
            ripeness,
            proportions,
            annotated: self.annotate.then(|| annotate(frame, &polygon)),
        })
    }

    fn name(&self) -> &'static str {
        "segmentation"
    }
}
