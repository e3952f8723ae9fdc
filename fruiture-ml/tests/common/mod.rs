//! Common test utilities for prediction tests
//!
//! This module provides:
//! - Small hand-built forest and scaler artifacts
//! - A predictor that counts its invocations
//! - Record builders for summarizer scenarios

#![allow(dead_code)]

use fruiture_core::time::parse_timestamp;
use fruiture_core::{ObservationRecord, RgbColor, Timestamp};
use fruiture_ml::{MLResult, Predictor};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn at(text: &str) -> Timestamp {
    parse_timestamp(text).expect("valid timestamp")
}

/// Five-class forest over the seven summary features.
///
/// Tree one splits on `max_gas <= 3`, tree two on `average_R <= 150`. High gas
/// and a red-shifted peel both vote overripe.
pub fn classifier_artifact() -> Value {
    json!({
        "kind": "classifier",
        "n_features": 7,
        "classes": [1, 2, 3, 4, 5],
        "estimators": [
            {
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [0, -2, -2],
                "threshold": [3.0, -2.0, -2.0],
                "value": [[9, 1, 1, 1, 8], [9, 1, 0, 0, 0], [0, 0, 1, 1, 8]]
            },
            {
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [4, -2, -2],
                "threshold": [150.0, -2.0, -2.0],
                "value": [[9, 1, 0, 2, 8], [9, 1, 0, 0, 0], [0, 0, 0, 2, 8]]
            }
        ]
    })
}

/// Single-tree regressor predicting 2.4 below `max_gas <= 3` and 3.6 above
pub fn regressor_artifact() -> Value {
    json!({
        "kind": "regressor",
        "n_features": 7,
        "estimators": [
            {
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [0, -2, -2],
                "threshold": [3.0, -2.0, -2.0],
                "value": [[3.0], [2.4], [3.6]]
            }
        ]
    })
}

/// Scaler that leaves features unchanged
pub fn identity_scaler() -> Value {
    json!({ "mean": vec![0.0; 7], "scale": vec![1.0; 7] })
}

pub fn write_artifact(path: &Path, artifact: &Value) {
    std::fs::write(path, artifact.to_string()).expect("write artifact");
}

/// Predictor returning a fixed day and counting calls
#[derive(Clone, Default)]
pub struct CountingPredictor {
    pub calls: Arc<AtomicUsize>,
}

impl CountingPredictor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Predictor for CountingPredictor {
    fn n_features(&self) -> usize {
        7
    }

    fn predict(&self, _features: &[f64]) -> MLResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(3.0)
    }
}

/// A fully populated record
pub fn record(timestamp: &str, gas: f64, colour: (u8, u8, u8)) -> ObservationRecord {
    ObservationRecord::from_parts(
        Some(at(timestamp)),
        Some(24.0),
        Some(60.0),
        Some(gas),
        Some(40),
        Some(RgbColor::new(colour.0, colour.1, colour.2)),
        None,
        Some(format!("images/raw_{}.jpg", timestamp.replace([' ', ':'], "_"))),
        None,
    )
}
