//! Integration tests for the periodic summarizer
//!
//! Tests the tick end to end against on-disk stores and artifacts:
//! - Summary snapshot and history with prediction columns
//! - Confidence gating of actuation and alerts
//! - Degraded summary-only mode
//! - Prediction skipped when a summary feature is unset

mod common;

use common::{
    at, classifier_artifact, identity_scaler, record, regressor_artifact, write_artifact, CountingPredictor,
};
use fruiture_core::storage::read_json;
use fruiture_core::{CsvRecordStore, MemoryStore, ObservationRecord, RecordSink, SummaryRecord};
use fruiture_ml::{
    ModelState, Predictor, RandomForest, StandardScaler, Summarizer, SummarizerConfig, FEATURE_NAMES,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;

fn load_model(dir: &Path, artifact: &serde_json::Value) -> ModelState {
    let model = dir.join("banana_model.json");
    let scaler = dir.join("banana_scaler.json");
    write_artifact(&model, artifact);
    write_artifact(&scaler, &identity_scaler());
    ModelState::load(&model, &scaler)
}

#[test]
fn test_confident_prediction_actuates_and_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CsvRecordStore::new(dir.path().join("banana_records.csv")));
    store.persist(&record("2025-03-14 12:00:00", 4.0, (180, 140, 20))).unwrap();
    store.persist(&record("2025-03-14 12:05:00", 5.0, (180, 140, 20))).unwrap();

    let model = load_model(dir.path(), &classifier_artifact());
    assert!(model.is_loaded());
    let summarizer = Summarizer::new(store, model).with_config(
        SummarizerConfig::default()
            .with_snapshot_path(dir.path().join("ml_input.json"))
            .with_history_path(dir.path().join("prediction_history.csv")),
    );

    let report = summarizer.tick(at("2025-03-14 12:10:00")).unwrap();
    assert_eq!(report.summary.record_count, 2);
    assert_eq!(report.summary.max_gas, Some(5.0));
    assert_eq!(report.summary.average_gas, Some(4.5));

    let prediction = report.prediction.unwrap();
    assert_eq!(prediction.day, 5);
    assert!((prediction.confidence.unwrap() - 0.8).abs() < 1e-9);

    let command = report.actuation.unwrap();
    assert_eq!((command.predicted_day, command.servo_angle), (5, 180));
    assert_eq!(command.confidence, Some(0.8));
    assert_eq!(command.timestamp, report.summary.timestamp);
    assert_eq!(report.alert.unwrap().day, 5);

    let snapshot: SummaryRecord = read_json(&dir.path().join("ml_input.json")).unwrap();
    assert_eq!(snapshot, report.summary);

    let history = std::fs::read_to_string(dir.path().join("prediction_history.csv")).unwrap();
    let lines: Vec<&str> = history.lines().collect();
    assert_eq!(
        lines[0],
        "timestamp,record_count,average_temperature,average_humidity,average_gas,max_gas,\
         average_R,average_G,average_B,predicted_day,confidence,servo_angle"
    );
    assert!(lines[1].ends_with(",5,0.8,180"), "{}", lines[1]);
}

#[test]
fn test_low_confidence_suppresses_actuation_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.persist(&record("2025-03-14 12:00:00", 2.0, (180, 140, 20))).unwrap();
    store.persist(&record("2025-03-14 12:05:00", 1.0, (180, 140, 20))).unwrap();

    let summarizer = Summarizer::new(store, load_model(dir.path(), &classifier_artifact()))
        .with_config(SummarizerConfig::default().with_history_path(dir.path().join("history.csv")));
    let report = summarizer.tick(at("2025-03-14 12:10:00")).unwrap();

    // votes [0.9, 0.1, 0, 0, 0] and [0, 0, 0, 0.2, 0.8]
    let prediction = report.prediction.unwrap();
    assert_eq!(prediction.day, 1);
    assert!((prediction.confidence.unwrap() - 0.45).abs() < 1e-9);
    assert_eq!(report.actuation, None);
    assert_eq!(report.alert, None);

    let history = std::fs::read_to_string(dir.path().join("history.csv")).unwrap();
    assert!(history.lines().nth(1).unwrap().ends_with(",1,0.45,0"));
}

#[test]
fn test_regressor_acts_without_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.persist(&record("2025-03-14 12:00:00", 5.0, (200, 180, 40))).unwrap();

    let summarizer = Summarizer::new(store, load_model(dir.path(), &regressor_artifact()));
    let report = summarizer.tick(at("2025-03-14 12:10:00")).unwrap();

    let command = report.actuation.unwrap();
    assert_eq!(command.predicted_day, 4);
    assert_eq!(command.servo_angle, 135);
    assert_eq!(command.confidence, None);
    assert!(report.alert.is_some());
}

#[test]
fn test_unset_feature_never_reaches_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    // no image fields, so the colour means are unset
    store
        .persist(&ObservationRecord::empty().with_temperature(22.0).with_humidity(55.0).with_gas(1.2))
        .unwrap();

    let predictor = CountingPredictor::default();
    let model = ModelState::loaded(predictor.clone(), StandardScaler::identity(7)).unwrap();
    let summarizer = Summarizer::new(store.clone(), model)
        .with_config(SummarizerConfig::default().with_snapshot_path(dir.path().join("ml_input.json")));

    let report = summarizer.tick(at("2025-03-14 12:10:00")).unwrap();
    assert_eq!(report.summary.average_r, None);
    assert_eq!(report.prediction, None);
    assert_eq!(predictor.calls(), 0);
    assert!(dir.path().join("ml_input.json").exists());

    store.persist(&record("2025-03-14 12:11:00", 1.5, (180, 140, 20))).unwrap();
    let report = summarizer.tick(at("2025-03-14 12:20:00")).unwrap();
    assert_eq!(report.summary.record_count, 2);
    assert_eq!(report.prediction.map(|p| p.day), Some(3));
    assert_eq!(predictor.calls(), 1);
}

#[test]
fn test_bad_artifacts_degrade_to_summary_only() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("banana_model.json");
    std::fs::write(&model_path, "{ not json").unwrap();
    let model = ModelState::load(&model_path, &dir.path().join("banana_scaler.json"));
    assert!(!model.is_loaded());

    let store = Arc::new(MemoryStore::new());
    store.persist(&record("2025-03-14 12:00:00", 5.0, (180, 140, 20))).unwrap();
    let summarizer = Summarizer::new(store, model);

    let first = summarizer.tick(at("2025-03-14 12:10:00")).unwrap();
    let second = summarizer.tick(at("2025-03-14 12:20:00")).unwrap();
    assert_eq!(first.prediction, None);
    assert_eq!(second.summary.record_count, 1);
}

#[test]
fn test_classifier_probabilities_are_distributions() {
    let forest = RandomForest::from_json(&classifier_artifact().to_string()).unwrap();
    assert_eq!(forest.n_features(), FEATURE_NAMES.len());

    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..200 {
        let features: Vec<f64> = (0..7).map(|_| rng.gen_range(0.0..255.0)).collect();
        let proba = forest.predict_proba(&features).unwrap().unwrap();
        let total: f64 = proba.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let best = proba
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > proba[best] { i } else { best });
        assert_eq!(forest.predict(&features).unwrap(), forest.classes()[best]);
    }
}
