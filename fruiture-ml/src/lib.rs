//! Ripening-Day Prediction for Fruiture
//!
//! ## Overview
//!
//! Turns the periodic summary of persisted observations into a predicted
//! ripening day (1 = very fresh, 5 = overripe), an actuator angle for the
//! ripeness dial, and an optional shelf-life alert.
//!
//! Training happens offline. This crate only evaluates exported artifacts:
//!
//! | Artifact | Format | Type |
//! |----------|--------|------|
//! | model    | JSON random forest (classifier or regressor) | [`RandomForest`] |
//! | scaler   | JSON `{mean, scale}` | [`StandardScaler`] |
//!
//! ## Pipeline
//!
//! ```text
//! RecordSource ──► SummaryRecord ──► FeatureVector ──► scale ──► forest
//!                       │                                          │
//!                       ▼                                          ▼
//!               ml_input.json + history               Prediction { day, confidence }
//!                                                                  │
//!                                         confidence gate ◄────────┘
//!                                                │
//!                                  ActuationCommand + Alert
//! ```
//!
//! ## Degraded Mode
//!
//! Missing artifacts are not an error at runtime. [`ModelState::load`]
//! returns [`ModelState::NotLoaded`] and the [`Summarizer`] keeps producing
//! plain summaries for the life of the process.
//!
//! ## Feature Order
//!
//! The forest was trained on seven columns in a fixed order; see
//! [`FEATURE_NAMES`]. Artifacts exported with a different width are rejected
//! at load time with [`MLError::FeatureMismatch`].

#![deny(unsafe_code)]

pub mod alert;
pub mod forest;
pub mod model;
pub mod node;
pub mod pipeline;
pub mod scaler;
pub mod scoring;
pub mod tree;

pub use alert::{status_message, Alert, AlertPolicy};
pub use forest::{ForestKind, RandomForest};
pub use model::ModelState;
pub use node::Node;
pub use pipeline::{Summarizer, SummarizerConfig, TickReport};
pub use scaler::StandardScaler;
pub use scoring::{ActuationCommand, FeatureVector, Prediction, FEATURE_NAMES};
pub use tree::{DecisionTree, TreeArrays};

use std::path::PathBuf;
use thiserror::Error;

/// Prediction errors
#[derive(Debug, Error)]
pub enum MLError {
    #[error("model artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("confidence {confidence:.3} below threshold {threshold}")]
    LowConfidence { confidence: f64, threshold: f64 },

    #[error("summary feature {0} is unset")]
    MissingFeature(&'static str),
}

pub type MLResult<T> = Result<T, MLError>;

/// A trained model evaluated on already-scaled features
pub trait Predictor: Send + Sync {
    /// Number of input features the model was trained on
    fn n_features(&self) -> usize;

    /// Point prediction: a class label or a regression value
    fn predict(&self, features: &[f64]) -> MLResult<f64>;

    /// Class probabilities, if the model produces them
    fn predict_proba(&self, _features: &[f64]) -> MLResult<Option<Vec<f64>>> {
        Ok(None)
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
