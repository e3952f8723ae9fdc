//! Random forest artifacts
//!
//! A forest is exported as JSON:
//!
//! ```json
//! {
//!   "kind": "classifier",
//!   "n_features": 7,
//!   "classes": [1, 2, 3, 4, 5],
//!   "estimators": [ { "children_left": [...], "children_right": [...],
//!                     "feature": [...], "threshold": [...], "value": [[...], ...] } ]
//! }
//! ```
//!
//! Classifier leaves hold per-class sample counts in `classes` order; each
//! tree's leaf is normalized to a distribution and the distributions are
//! averaged. The predicted class is the arg-max (first on ties) and the
//! confidence is its averaged probability.
//!
//! Regressor leaves hold a single value; the prediction is the mean over
//! trees and no probabilities are produced.

use crate::tree::{DecisionTree, TreeArrays};
use crate::{MLError, MLResult, Predictor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What the forest predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForestKind {
    Classifier,
    Regressor,
}

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    kind: ForestKind,
    n_features: usize,
    #[serde(default)]
    classes: Vec<f64>,
    estimators: Vec<TreeArrays>,
}

/// Ensemble of decision trees loaded from an exported artifact
#[derive(Debug, Clone)]
pub struct RandomForest {
    kind: ForestKind,
    n_features: usize,
    classes: Vec<f64>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Parse and validate a JSON artifact
    pub fn from_json(text: &str) -> MLResult<Self> {
        let artifact: ForestArtifact =
            serde_json::from_str(text).map_err(|e| MLError::InvalidArtifact(e.to_string()))?;

        if artifact.estimators.is_empty() {
            return Err(MLError::InvalidArtifact("forest has no trees".into()));
        }
        if artifact.n_features == 0 {
            return Err(MLError::InvalidArtifact("forest has no features".into()));
        }
        let width = match artifact.kind {
            ForestKind::Classifier if artifact.classes.is_empty() => {
                return Err(MLError::InvalidArtifact("classifier lists no classes".into()));
            }
            ForestKind::Classifier => artifact.classes.len(),
            ForestKind::Regressor => 1,
        };

        let trees = artifact
            .estimators
            .into_iter()
            .map(|arrays| DecisionTree::from_arrays(arrays, artifact.n_features))
            .collect::<MLResult<Vec<_>>>()?;
        if let Some(bad) = trees.iter().flat_map(DecisionTree::leaves).find(|v| v.len() != width) {
            return Err(MLError::InvalidArtifact(format!(
                "leaf holds {} values, expected {width}",
                bad.len()
            )));
        }

        Ok(Self {
            kind: artifact.kind,
            n_features: artifact.n_features,
            classes: artifact.classes,
            trees,
        })
    }

    /// Load from a file; a missing file is [`MLError::MissingArtifact`]
    pub fn load(path: &Path) -> MLResult<Self> {
        if !path.exists() {
            return Err(MLError::MissingArtifact(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|e| MLError::InvalidArtifact(e.to_string()))?;
        Self::from_json(&text)
    }

    pub fn kind(&self) -> ForestKind {
        self.kind
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn check_width(&self, features: &[f64]) -> MLResult<()> {
        if features.len() != self.n_features {
            return Err(MLError::FeatureMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        Ok(())
    }

    fn class_distribution(&self, features: &[f64]) -> Vec<f64> {
        let mut averaged = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let counts = tree.leaf_value(features);
            let total: f64 = counts.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (slot, count) in averaged.iter_mut().zip(counts) {
                *slot += count / total;
            }
        }
        let n = self.trees.len() as f64;
        averaged.iter_mut().for_each(|p| *p /= n);
        averaged
    }
}

impl Predictor for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> MLResult<f64> {
        self.check_width(features)?;
        match self.kind {
            ForestKind::Classifier => {
                let distribution = self.class_distribution(features);
                let best = distribution
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, p)| if *p > distribution[best] { i } else { best });
                Ok(self.classes[best])
            }
            ForestKind::Regressor => {
                let sum: f64 = self
                    .trees
                    .iter()
                    .filter_map(|tree| tree.leaf_value(features).first())
                    .sum();
                Ok(sum / self.trees.len() as f64)
            }
        }
    }

    fn predict_proba(&self, features: &[f64]) -> MLResult<Option<Vec<f64>>> {
        self.check_width(features)?;
        Ok(match self.kind {
            ForestKind::Classifier => Some(self.class_distribution(features)),
            ForestKind::Regressor => None,
        })
    }
}
