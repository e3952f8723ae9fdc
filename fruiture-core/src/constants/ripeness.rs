//! Colour-Segmentation Calibration
//!
//! Values were calibrated for ESP32-CAM frames under indoor lighting. Hue is
//! on the 8-bit scale (0-180, i.e. degrees / 2), saturation and value on 0-255.
//! All ranges are inclusive on both ends.

/// Inclusive HSV range `(lower, upper)`.
pub type HsvRange = ([u8; 3], [u8; 3]);

// ===== COLOUR CLASSES =====

/// Unripe peel.
pub const GREEN_RANGE: HsvRange = ([30, 40, 40], [80, 255, 255]);

/// Ripe peel. Overlaps green between hue 30 and 35 on purpose.
pub const YELLOW_RANGE: HsvRange = ([18, 60, 60], [35, 255, 255]);

/// Sugar spots and late ripening. Capped at S/V 200 so saturated yellow stays yellow.
pub const BROWN_RANGE: HsvRange = ([5, 50, 50], [25, 200, 200]);

/// Spoilage. Dark and weakly saturated, still above the black-level floor of 20.
pub const BLACK_RANGE: HsvRange = ([0, 0, 20], [25, 120, 80]);

/// Pixels at or below this saturation are gray (background, specular highlights)
/// and never count towards any class.
pub const GRAY_SATURATION_MAX: u8 = 40;

// ===== FILTERS =====

/// Sigma of the 7x7 Gaussian applied to the HSV frame.
///
/// Derived from the kernel size as `0.3 * ((k - 1) / 2 - 1) + 0.8`.
pub const HSV_BLUR_SIGMA: f32 = 1.4;

/// Sigma of the 9x9 Gaussian used to smooth mask edges before tracing.
pub const MASK_BLUR_SIGMA: f32 = 1.7;

/// Re-threshold level after mask smoothing (strictly greater is foreground).
pub const MASK_THRESHOLD: u8 = 127;

/// Contrast limit of the adaptive equalization, relative to a flat histogram.
pub const CLAHE_CLIP_LIMIT: f64 = 2.0;

/// Tile grid (columns, rows) of the adaptive equalization.
pub const CLAHE_TILE_GRID: (u32, u32) = (8, 8);

/// Elliptical structuring element size (pixels, odd).
pub const MORPH_KERNEL_SIZE: u32 = 7;

/// Passes of each morphological operation.
pub const MORPH_ITERATIONS: usize = 2;

// ===== CONTOUR SELECTION =====

/// Smallest contour area accepted as a banana (px²). Smaller blobs are noise.
pub const MIN_CONTOUR_AREA_PX: f64 = 400.0;

/// Polygon approximation tolerance as a fraction of the contour perimeter.
pub const POLY_EPSILON_FACTOR: f64 = 0.003;

// ===== SCORE =====

/// Ripeness weight per colour class, in tenths: green, yellow, brown, black.
///
/// Green contributes nothing, yellow is early ripening, brown late ripening,
/// black spoilage. These are a design constant, not learned.
pub const RIPENESS_WEIGHTS_TENTHS: [i64; 4] = [0, 3, 7, 10];

/// Hue (degrees) that maps to ripeness 0 in the hue strategy.
pub const HUE_UNRIPE_DEGREES: f64 = 120.0;
