//! Observation records
//!
//! An [`ObservationRecord`] is an immutable value. The aggregator never edits
//! a record in place: each merge consumes the current value and returns a new
//! one, and a reset installs [`ObservationRecord::empty`]. Every field is
//! optional; "unset" is `None`.
//!
//! Completion is decided by a [`RequiredFields`] set, configurable per
//! deployment:
//!
//! | Preset | Fields |
//! |--------|--------|
//! | `minimal` | timestamp, temperature, humidity, ripeness |
//! | `archival` | timestamp, temperature, humidity, gas, image path |

use crate::events::{FieldPayload, ImageObservation};
use crate::ripeness::{ColorProportions, RgbColor};
use crate::time::{serde_timestamp_opt, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fused multi-channel observation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationRecord {
    #[serde(with = "serde_timestamp_opt")]
    timestamp: Option<Timestamp>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    gas: Option<f64>,
    image_path: Option<String>,
    processed_image_path: Option<String>,
    ripeness: Option<u8>,
    mean_color: Option<RgbColor>,
    proportions: Option<ColorProportions>,
}

impl ObservationRecord {
    /// A fresh record with every field unset
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn gas(&self) -> Option<f64> {
        self.gas
    }

    pub fn image_path(&self) -> Option<&str> {
        self.image_path.as_deref()
    }

    pub fn processed_image_path(&self) -> Option<&str> {
        self.processed_image_path.as_deref()
    }

    pub fn ripeness(&self) -> Option<u8> {
        self.ripeness
    }

    pub fn mean_color(&self) -> Option<RgbColor> {
        self.mean_color
    }

    pub fn proportions(&self) -> Option<ColorProportions> {
        self.proportions
    }

    /// True when no field has been assigned
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_temperature(mut self, value: f64) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn with_humidity(mut self, value: f64) -> Self {
        self.humidity = Some(value);
        self
    }

    pub fn with_gas(mut self, value: f64) -> Self {
        self.gas = Some(value);
        self
    }

    /// Replace every image-derived field with the observation's values.
    ///
    /// Unset values in the observation clear the corresponding field, so a
    /// frame without measurable foreground cannot leave a stale score behind.
    pub fn with_image(mut self, image: ImageObservation) -> Self {
        self.ripeness = image.ripeness;
        self.mean_color = Some(image.mean_color);
        self.proportions = image.proportions;
        self.image_path = image.image_path;
        self.processed_image_path = image.processed_image_path;
        self
    }

    /// Merge one payload; diagnostic payloads return the record unchanged
    pub fn merge(self, payload: &FieldPayload) -> Self {
        match payload {
            FieldPayload::Temperature(v) => self.with_temperature(*v),
            FieldPayload::Humidity(v) => self.with_humidity(*v),
            FieldPayload::Gas(v) => self.with_gas(*v),
            FieldPayload::RawGas(_) => self,
            FieldPayload::Image(image) => self.with_image(image.clone()),
        }
    }

    /// Whether `field` is set
    pub fn has(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::Timestamp => self.timestamp.is_some(),
            RequiredField::Temperature => self.temperature.is_some(),
            RequiredField::Humidity => self.humidity.is_some(),
            RequiredField::Gas => self.gas.is_some(),
            RequiredField::Ripeness => self.ripeness.is_some(),
            RequiredField::MeanColor => self.mean_color.is_some(),
            RequiredField::Proportions => self.proportions.is_some(),
            RequiredField::ImagePath => self.image_path.is_some(),
            RequiredField::ProcessedImagePath => self.processed_image_path.is_some(),
        }
    }

    /// Scalar columns for the continuous sensor log
    pub fn scalars(&self) -> ScalarSnapshot {
        ScalarSnapshot {
            timestamp: self.timestamp,
            temperature: self.temperature,
            humidity: self.humidity,
            gas: self.gas,
        }
    }

    /// Rebuild a record from stored columns
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        timestamp: Option<Timestamp>,
        temperature: Option<f64>,
        humidity: Option<f64>,
        gas: Option<f64>,
        ripeness: Option<u8>,
        mean_color: Option<RgbColor>,
        proportions: Option<ColorProportions>,
        image_path: Option<String>,
        processed_image_path: Option<String>,
    ) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
            gas,
            image_path,
            processed_image_path,
            ripeness,
            mean_color,
            proportions,
        }
    }
}

/// Scalar state of the in-flight record at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalarSnapshot {
    #[serde(with = "serde_timestamp_opt")]
    pub timestamp: Option<Timestamp>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub gas: Option<f64>,
}

/// A field that can be required for completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Timestamp,
    Temperature,
    Humidity,
    Gas,
    Ripeness,
    MeanColor,
    Proportions,
    ImagePath,
    ProcessedImagePath,
}

impl RequiredField {
    pub const fn name(&self) -> &'static str {
        match self {
            RequiredField::Timestamp => "timestamp",
            RequiredField::Temperature => "temperature",
            RequiredField::Humidity => "humidity",
            RequiredField::Gas => "gas",
            RequiredField::Ripeness => "ripeness",
            RequiredField::MeanColor => "mean_color",
            RequiredField::Proportions => "proportions",
            RequiredField::ImagePath => "image_path",
            RequiredField::ProcessedImagePath => "processed_image_path",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of fields that must all be present for a record to complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFields {
    fields: Vec<RequiredField>,
}

impl Default for RequiredFields {
    fn default() -> Self {
        Self::archival()
    }
}

impl RequiredFields {
    pub fn new(fields: impl IntoIterator<Item = RequiredField>) -> Self {
        let mut unique = Vec::new();
        for field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self { fields: unique }
    }

    /// Scalars plus the colour-derived score
    pub fn minimal() -> Self {
        Self::new([
            RequiredField::Timestamp,
            RequiredField::Temperature,
            RequiredField::Humidity,
            RequiredField::Ripeness,
        ])
    }

    /// All scalars plus an archived frame
    pub fn archival() -> Self {
        Self::new([
            RequiredField::Timestamp,
            RequiredField::Temperature,
            RequiredField::Humidity,
            RequiredField::Gas,
            RequiredField::ImagePath,
        ])
    }

    pub fn fields(&self) -> &[RequiredField] {
        &self.fields
    }

    pub fn is_complete(&self, record: &ObservationRecord) -> bool {
        self.fields.iter().all(|&field| record.has(field))
    }

    /// Required fields still unset on `record`
    pub fn missing(&self, record: &ObservationRecord) -> Vec<RequiredField> {
        self.fields.iter().copied().filter(|&field| !record.has(field)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn image(ripeness: Option<u8>) -> ImageObservation {
        ImageObservation {
            ripeness,
            mean_color: RgbColor::new(180, 140, 20),
            proportions: ripeness.map(|_| ColorProportions::new(10.0, 70.0, 15.0, 5.0)),
            image_path: Some("raw_1.jpg".into()),
            processed_image_path: None,
        }
    }

    #[test]
    fn merge_is_last_write_wins() {
        let record = ObservationRecord::empty()
            .merge(&FieldPayload::Temperature(20.0))
            .merge(&FieldPayload::Temperature(21.5))
            .merge(&FieldPayload::RawGas(999.0));
        assert_eq!(record.temperature(), Some(21.5));
        assert_eq!(record.gas(), None);
    }

    #[test]
    fn image_without_foreground_clears_score() {
        let record = ObservationRecord::empty()
            .merge(&FieldPayload::Image(image(Some(42))))
            .merge(&FieldPayload::Image(image(None)));
        assert_eq!(record.ripeness(), None);
        assert_eq!(record.proportions(), None);
        assert_eq!(record.mean_color(), Some(RgbColor::new(180, 140, 20)));
    }

    #[test]
    fn presets() {
        let ts = parse_timestamp("2025-03-14 12:00:00").unwrap();
        let record = ObservationRecord::empty()
            .with_timestamp(ts)
            .with_temperature(24.5)
            .with_humidity(60.0)
            .merge(&FieldPayload::Image(image(Some(42))));

        assert!(RequiredFields::minimal().is_complete(&record));
        assert!(!RequiredFields::archival().is_complete(&record));
        assert_eq!(RequiredFields::archival().missing(&record), vec![RequiredField::Gas]);
    }

    #[test]
    fn duplicate_fields_collapse() {
        let set = RequiredFields::new([RequiredField::Gas, RequiredField::Gas]);
        assert_eq!(set.fields(), &[RequiredField::Gas]);
        assert!(ObservationRecord::empty().is_empty());
        assert!(RequiredFields::new([]).is_complete(&ObservationRecord::empty()));
    }
}
