//! Features, predictions and actuation
//!
//! The model sees seven summary statistics in a fixed order. Its output is
//! snapped to a ripening day and mapped linearly onto the dial:
//!
//! ```text
//! day    1    2    3    4    5
//! angle  0°   45°  90°  135° 180°
//! ```

use crate::{MLError, MLResult};
use fruiture_core::constants::pipeline::{ACTUATOR_DEGREES_PER_DAY, MAX_PREDICTED_DAY, MIN_PREDICTED_DAY};
use fruiture_core::summary::round_summary;
use fruiture_core::time::serde_timestamp;
use fruiture_core::{SummaryRecord, Timestamp};
use serde::{Deserialize, Serialize};

/// Model input columns, in training order
pub const FEATURE_NAMES: [&str; 7] = [
    "max_gas",
    "average_gas",
    "average_temperature",
    "average_humidity",
    "average_R",
    "average_G",
    "average_B",
];

/// Complete model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; 7]);

impl FeatureVector {
    /// Extract features from a summary; any unset statistic is an error
    pub fn from_summary(summary: &SummaryRecord) -> MLResult<Self> {
        let columns = [
            summary.max_gas,
            summary.average_gas,
            summary.average_temperature,
            summary.average_humidity,
            summary.average_r,
            summary.average_g,
            summary.average_b,
        ];
        let mut values = [0.0; 7];
        for ((slot, column), name) in values.iter_mut().zip(columns).zip(FEATURE_NAMES) {
            *slot = column.ok_or(MLError::MissingFeature(name))?;
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Model output snapped to a ripening day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Day 1 (very fresh) to 5 (overripe)
    pub day: u8,
    /// Probability of the predicted class; unset for regressors
    pub confidence: Option<f64>,
}

impl Prediction {
    /// Round and clamp a raw model output into the day range
    pub fn from_raw(raw: f64, confidence: Option<f64>) -> Self {
        let day = if raw.is_finite() {
            raw.round().clamp(MIN_PREDICTED_DAY as f64, MAX_PREDICTED_DAY as f64) as u8
        } else {
            MIN_PREDICTED_DAY
        };
        Self { day, confidence }
    }

    /// Servo angle for the dial, 0..=180
    pub fn actuator_angle(&self) -> u16 {
        (self.day.saturating_sub(MIN_PREDICTED_DAY)) as u16 * ACTUATOR_DEGREES_PER_DAY
    }

    /// Days of shelf life left before spoilage
    pub fn remaining_days(&self) -> u8 {
        MAX_PREDICTED_DAY.saturating_sub(self.day)
    }

    /// Whether the prediction is confident enough to act on.
    ///
    /// Predictions without a confidence (regressors) always pass.
    pub fn check_confidence(&self, threshold: f64) -> MLResult<()> {
        match self.confidence {
            Some(confidence) if confidence < threshold => Err(MLError::LowConfidence { confidence, threshold }),
            _ => Ok(()),
        }
    }
}

/// Payload published to the actuator topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuationCommand {
    pub predicted_day: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub servo_angle: u16,
    #[serde(with = "serde_timestamp")]
    pub timestamp: Timestamp,
}

impl ActuationCommand {
    pub fn new(prediction: &Prediction, timestamp: Timestamp) -> Self {
        Self {
            predicted_day: prediction.day,
            confidence: prediction.confidence.map(round_summary),
            servo_angle: prediction.actuator_angle(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fruiture_core::time::parse_timestamp;

    fn summary() -> SummaryRecord {
        SummaryRecord {
            timestamp: parse_timestamp("2025-03-14 12:10:00").unwrap(),
            record_count: 3,
            average_temperature: Some(24.0),
            average_humidity: Some(61.0),
            average_gas: Some(2.5),
            max_gas: Some(4.0),
            average_r: Some(180.0),
            average_g: Some(140.0),
            average_b: Some(20.0),
        }
    }

    #[test]
    fn test_feature_order() {
        let features = FeatureVector::from_summary(&summary()).unwrap();
        assert_eq!(features.0, [4.0, 2.5, 24.0, 61.0, 180.0, 140.0, 20.0]);
    }

    #[test]
    fn test_unset_feature_is_named() {
        let mut summary = summary();
        summary.average_humidity = None;
        assert!(matches!(
            FeatureVector::from_summary(&summary),
            Err(MLError::MissingFeature("average_humidity"))
        ));
    }

    #[test]
    fn test_day_mapping() {
        assert_eq!(Prediction::from_raw(2.6, None).day, 3);
        assert_eq!(Prediction::from_raw(0.2, None).day, 1);
        assert_eq!(Prediction::from_raw(7.9, None).day, 5);
        assert_eq!(Prediction::from_raw(f64::NAN, None).day, 1);

        let angles: Vec<u16> = (1..=5)
            .map(|day| Prediction::from_raw(day as f64, None).actuator_angle())
            .collect();
        assert_eq!(angles, vec![0, 45, 90, 135, 180]);
        assert_eq!(Prediction::from_raw(2.0, None).remaining_days(), 3);
    }

    #[test]
    fn test_confidence_gate() {
        assert!(Prediction::from_raw(3.0, Some(0.7)).check_confidence(0.7).is_ok());
        assert!(Prediction::from_raw(3.0, None).check_confidence(0.7).is_ok());
        assert!(matches!(
            Prediction::from_raw(3.0, Some(0.69)).check_confidence(0.7),
            Err(MLError::LowConfidence { .. })
        ));
    }

    #[test]
    fn test_actuation_payload() {
        let prediction = Prediction::from_raw(4.0, Some(0.83333));
        let command = ActuationCommand::new(&prediction, summary().timestamp);
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "predicted_day": 4,
                "confidence": 0.833,
                "servo_angle": 135,
                "timestamp": "2025-03-14 12:10:00"
            })
        );
    }
}
