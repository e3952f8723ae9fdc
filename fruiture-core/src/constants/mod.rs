//! Constants for Fruiture Core
//!
//! Centralized constants used throughout the Fruiture system. Numeric values
//! are defined here with the calibration they come from, so that the estimator
//! and the pipeline never carry magic numbers.
//!
//! ## Organization
//!
//! - **Ripeness**: colour ranges, filter sizes and score weights of the
//!   segmentation estimator (calibrated against ESP32-CAM frames)
//! - **Pipeline**: intervals, thresholds and transport defaults
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. HSV values use the 8-bit convention (hue 0-180, saturation/value 0-255)
//! 3. Use descriptive names that include units

/// Colour-segmentation calibration and ripeness score weights.
pub mod ripeness;

/// Pipeline intervals, thresholds and transport defaults.
pub mod pipeline;

pub use ripeness::{
    GREEN_RANGE, YELLOW_RANGE, BROWN_RANGE, BLACK_RANGE,
    GRAY_SATURATION_MAX, MIN_CONTOUR_AREA_PX,
};

pub use pipeline::{
    SUMMARY_INTERVAL_SECS, MIN_ACTION_CONFIDENCE, ACTUATOR_DEGREES_PER_DAY,
    ALERT_REMAINING_DAYS, MAX_PREDICTED_DAY, MIN_PREDICTED_DAY,
};
