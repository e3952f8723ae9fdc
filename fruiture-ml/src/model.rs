//! Model lifecycle
//!
//! Artifacts are loaded once at startup. Every call site branches on
//! [`ModelState`] instead of handling load failures itself; a process that
//! starts without artifacts stays in summary-only mode.

use crate::forest::RandomForest;
use crate::scaler::StandardScaler;
use crate::scoring::{FeatureVector, Prediction};
use crate::{MLError, MLResult, Predictor};
use log::{info, warn};
use std::path::Path;

/// Loaded model and scaler, or neither
pub enum ModelState {
    NotLoaded,
    Loaded {
        model: Box<dyn Predictor>,
        scaler: StandardScaler,
    },
}

impl ModelState {
    /// Load both artifacts, degrading to [`ModelState::NotLoaded`] on any failure.
    ///
    /// The outcome is logged here, once.
    pub fn load(model_path: &Path, scaler_path: &Path) -> Self {
        match Self::try_load(model_path, scaler_path) {
            Ok(state) => {
                info!("Model and scaler loaded from {}", model_path.display());
                state
            }
            Err(e @ MLError::MissingArtifact(_)) => {
                info!("{e}; summaries will be published without predictions");
                ModelState::NotLoaded
            }
            Err(e) => {
                warn!("Model not loaded: {e}; summaries will be published without predictions");
                ModelState::NotLoaded
            }
        }
    }

    pub fn try_load(model_path: &Path, scaler_path: &Path) -> MLResult<Self> {
        let model = RandomForest::load(model_path)?;
        let scaler = StandardScaler::load(scaler_path)?;
        Self::loaded(model, scaler)
    }

    /// Pair a model with its scaler; their widths must agree
    pub fn loaded(model: impl Predictor + 'static, scaler: StandardScaler) -> MLResult<Self> {
        if model.n_features() != scaler.n_features() {
            return Err(MLError::FeatureMismatch {
                expected: model.n_features(),
                actual: scaler.n_features(),
            });
        }
        Ok(ModelState::Loaded {
            model: Box::new(model),
            scaler,
        })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded { .. })
    }

    /// Scale, predict and snap to a day
    pub fn predict(&self, features: &FeatureVector) -> MLResult<Prediction> {
        let ModelState::Loaded { model, scaler } = self else {
            return Err(MLError::MissingArtifact(Default::default()));
        };
        let scaled = scaler.transform(features.as_slice())?;
        let raw = model.predict(&scaled)?;
        let confidence = model
            .predict_proba(&scaled)?
            .and_then(|distribution| distribution.into_iter().reduce(f64::max));
        Ok(Prediction::from_raw(raw, confidence))
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::NotLoaded => f.write_str("NotLoaded"),
            ModelState::Loaded { scaler, .. } => f
                .debug_struct("Loaded")
                .field("n_features", &scaler.n_features())
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f64);

    impl Predictor for Constant {
        fn n_features(&self) -> usize {
            7
        }

        fn predict(&self, _features: &[f64]) -> MLResult<f64> {
            Ok(self.0)
        }

        fn predict_proba(&self, _features: &[f64]) -> MLResult<Option<Vec<f64>>> {
            Ok(Some(vec![0.1, 0.75, 0.15]))
        }
    }

    #[test]
    fn test_missing_artifacts_degrade() {
        let dir = tempfile::tempdir().unwrap();
        let state = ModelState::load(&dir.path().join("model.json"), &dir.path().join("scaler.json"));
        assert!(!state.is_loaded());
        assert!(matches!(
            state.predict(&FeatureVector([0.0; 7])),
            Err(MLError::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_loaded_prediction_takes_max_probability() {
        let state = ModelState::loaded(Constant(2.0), StandardScaler::identity(7)).unwrap();
        let prediction = state.predict(&FeatureVector([1.0; 7])).unwrap();
        assert_eq!(prediction.day, 2);
        assert_eq!(prediction.confidence, Some(0.75));
    }

    #[test]
    fn test_width_disagreement_is_rejected() {
        assert!(matches!(
            ModelState::loaded(Constant(2.0), StandardScaler::identity(3)),
            Err(MLError::FeatureMismatch { expected: 7, actual: 3 })
        ));
    }
}
