//! Shelf-life alerts

use crate::scoring::Prediction;
use fruiture_core::constants::pipeline::ALERT_REMAINING_DAYS;
use fruiture_core::time::format_timestamp;
use fruiture_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Human-readable status of a ripening day
pub fn status_message(day: u8) -> &'static str {
    match day {
        0 | 1 => "Very fresh, around 4 days until it spoils.",
        2 => "Still fresh, about 3 days remaining.",
        3 => "Nicely ripe, good for eating now.",
        4 => "Getting soft, best to eat today or tomorrow.",
        _ => "Overripe, eat soon or it will spoil!",
    }
}

/// When to notify about remaining shelf life
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPolicy {
    /// Notify when fewer days than this remain
    pub remaining_days: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            remaining_days: ALERT_REMAINING_DAYS,
        }
    }
}

impl AlertPolicy {
    pub fn new(remaining_days: f64) -> Self {
        Self { remaining_days }
    }

    pub fn should_alert(&self, prediction: &Prediction) -> bool {
        (prediction.remaining_days() as f64) < self.remaining_days
    }

    /// The alert for `prediction`, if the policy fires
    pub fn evaluate(&self, prediction: &Prediction, timestamp: Timestamp) -> Option<Alert> {
        self.should_alert(prediction).then(|| Alert {
            day: prediction.day,
            status: status_message(prediction.day),
            timestamp,
        })
    }
}

/// An outbound notification
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub day: u8,
    pub status: &'static str,
    pub timestamp: Timestamp,
}

impl Alert {
    /// Markdown body for chat delivery
    pub fn markdown(&self) -> String {
        format!(
            "*Fruiture Banana Update!*\nPredicted ripeness: *Day {}*\n{}\nTimestamp: {}",
            self.day,
            self.status,
            format_timestamp(&self.timestamp)
        )
    }
}
