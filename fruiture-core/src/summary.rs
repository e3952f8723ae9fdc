//! Summary statistics over the persisted record set
//!
//! A [`SummaryRecord`] is a read-only value computed from a closed slice of
//! records: the count, the means of the scalar and colour columns, and the
//! maximum gas reading. Means skip unset values; a column with no values at
//! all stays unset. All statistics are rounded to three decimals.

use crate::constants::pipeline::SUMMARY_DECIMALS;
use crate::record::ObservationRecord;
use crate::time::{serde_timestamp, Timestamp};
use serde::{Deserialize, Serialize};

/// Aggregate of the records persisted since process start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(with = "serde_timestamp")]
    pub timestamp: Timestamp,
    pub record_count: usize,
    pub average_temperature: Option<f64>,
    pub average_humidity: Option<f64>,
    pub average_gas: Option<f64>,
    pub max_gas: Option<f64>,
    #[serde(rename = "average_R")]
    pub average_r: Option<f64>,
    #[serde(rename = "average_G")]
    pub average_g: Option<f64>,
    #[serde(rename = "average_B")]
    pub average_b: Option<f64>,
}

impl SummaryRecord {
    /// Summarize `records`; `None` for an empty set
    pub fn compute(records: &[ObservationRecord], at: Timestamp) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let colour = |channel: fn(&crate::ripeness::RgbColor) -> u8| {
            mean(records.iter().filter_map(|r| r.mean_color()).map(|c| channel(&c) as f64))
        };

        Some(Self {
            timestamp: at,
            record_count: records.len(),
            average_temperature: mean(records.iter().filter_map(ObservationRecord::temperature)),
            average_humidity: mean(records.iter().filter_map(ObservationRecord::humidity)),
            average_gas: mean(records.iter().filter_map(ObservationRecord::gas)),
            max_gas: records
                .iter()
                .filter_map(ObservationRecord::gas)
                .reduce(f64::max)
                .map(round_summary),
            average_r: colour(|c| c.r),
            average_g: colour(|c| c.g),
            average_b: colour(|c| c.b),
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| round_summary(sum / count as f64))
}

/// Round half away from zero to the summary precision
pub fn round_summary(value: f64) -> f64 {
    let scale = 10f64.powi(SUMMARY_DECIMALS);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FieldPayload, ImageObservation};
    use crate::ripeness::RgbColor;
    use crate::time::parse_timestamp;

    fn now() -> Timestamp {
        parse_timestamp("2025-03-14 12:10:00").unwrap()
    }

    fn with_colour(record: ObservationRecord, r: u8, g: u8, b: u8) -> ObservationRecord {
        record.merge(&FieldPayload::Image(ImageObservation {
            ripeness: None,
            mean_color: RgbColor::new(r, g, b),
            proportions: None,
            image_path: None,
            processed_image_path: None,
        }))
    }

    #[test]
    fn empty_set_has_no_summary() {
        assert_eq!(SummaryRecord::compute(&[], now()), None);
    }

    #[test]
    fn means_skip_unset_values() {
        let records = vec![
            with_colour(ObservationRecord::empty().with_temperature(20.0).with_gas(1.0), 100, 0, 10),
            ObservationRecord::empty().with_temperature(21.0).with_gas(4.0),
            with_colour(ObservationRecord::empty().with_temperature(23.0), 201, 0, 11),
        ];
        let summary = SummaryRecord::compute(&records, now()).unwrap();

        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.average_temperature, Some(21.333));
        assert_eq!(summary.average_humidity, None);
        assert_eq!(summary.average_gas, Some(2.5));
        assert_eq!(summary.max_gas, Some(4.0));
        assert_eq!(summary.average_r, Some(150.5));
        assert_eq!(summary.average_b, Some(10.5));
    }

    #[test]
    fn json_uses_reference_keys() {
        let records = vec![with_colour(ObservationRecord::empty().with_gas(2.0), 1, 2, 3)];
        let json = serde_json::to_value(SummaryRecord::compute(&records, now()).unwrap()).unwrap();
        assert_eq!(json["timestamp"], "2025-03-14 12:10:00");
        assert_eq!(json["average_G"], 2.0);
        assert_eq!(json["max_gas"], 2.0);
        assert!(json["average_humidity"].is_null());
    }
}
