//! Standard feature scaling
//!
//! `z = (x - mean) / scale`, column by column, with the statistics fitted at
//! training time. A zero scale (a constant training column) is treated as 1.

use crate::{MLError, MLResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fitted per-column mean and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> MLResult<Self> {
        if mean.len() != scale.len() {
            return Err(MLError::InvalidArtifact(format!(
                "scaler has {} means but {} scales",
                mean.len(),
                scale.len()
            )));
        }
        Ok(Self { mean, scale })
    }

    /// Identity scaling over `n` columns
    pub fn identity(n: usize) -> Self {
        Self {
            mean: vec![0.0; n],
            scale: vec![1.0; n],
        }
    }

    pub fn from_json(text: &str) -> MLResult<Self> {
        let raw: Self = serde_json::from_str(text).map_err(|e| MLError::InvalidArtifact(e.to_string()))?;
        Self::new(raw.mean, raw.scale)
    }

    /// Load from a file; a missing file is [`MLError::MissingArtifact`]
    pub fn load(path: &Path) -> MLResult<Self> {
        if !path.exists() {
            return Err(MLError::MissingArtifact(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|e| MLError::InvalidArtifact(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &[f64]) -> MLResult<Vec<f64>> {
        if features.len() != self.mean.len() {
            return Err(MLError::FeatureMismatch {
                expected: self.mean.len(),
                actual: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}
