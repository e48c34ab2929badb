//! The inference pipeline: feature derivation, dual-model inference and
//! fusion, plus the orchestration that ties them to the shared state and
//! the result sink.

use crate::error::AppError;
use crate::features::{FeatureVector, extract};
use crate::model::ModelBundle;
use crate::model::forest::OUTLIER_LABEL;
use crate::sink::ResultSink;
use crate::state::{
    AnomalyVerdict, AppState, AqLevel, ClassificationVerdict, InferenceRecord, SensorSample,
};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::warn;

pub mod fusion;

/// Internal consistency faults: the bundle and the feature pipeline
/// disagree. Not something a caller can fix by retrying.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model feature order references unknown feature: {0}")]
    UnknownFeature(String),
    #[error("classifier produced level {0} outside the known level set")]
    LevelOutOfRange(i64),
}

/// Runs both models over one feature vector.
///
/// The scaled vector feeds only the outlier model; the classifier sees the
/// raw features. That asymmetry matches how the two models were trained and
/// must not be "fixed" here.
pub fn run_inference(
    features: &FeatureVector,
    bundle: &ModelBundle,
) -> Result<(ClassificationVerdict, AnomalyVerdict), InferenceError> {
    let input = assemble_input(features, &bundle.feature_order)?;

    let scaled = bundle.scaler.transform(&input);
    let score = round_to(bundle.outlier.decision_function(&scaled), 3);
    let is_anomaly = bundle.outlier.predict(&scaled) == OUTLIER_LABEL;

    let raw_level = bundle.classifier.predict(&input);
    let level =
        AqLevel::from_class(raw_level).ok_or(InferenceError::LevelOutOfRange(raw_level))?;
    let confidence = round_to(max_probability(&bundle.classifier.predict_proba(&input)), 2);

    Ok((
        ClassificationVerdict { level, confidence },
        AnomalyVerdict { score, is_anomaly },
    ))
}

/// One full pipeline pass: append + derive under the state write lock, then
/// infer, fuse, publish the record and hand it to the sink. A sink failure
/// is logged and does not fail the call.
pub fn run_pipeline(
    state: &Arc<RwLock<AppState>>,
    bundle: &ModelBundle,
    sink: &dyn ResultSink,
    sample: SensorSample,
) -> Result<InferenceRecord, AppError> {
    // Window append and feature derivation stay under one write lock;
    // concurrent calls must not interleave their appends.
    let features = {
        let mut guard = state.write().map_err(|_| AppError::StateLock)?;
        extract(guard.window_mut(), &sample)
    };

    let (classification, anomaly) = run_inference(&features, bundle)?;
    let result = fusion::fuse(&classification, &anomaly);

    let record = InferenceRecord {
        sample,
        features,
        result,
    };

    {
        let mut guard = state.write().map_err(|_| AppError::StateLock)?;
        guard.set_latest(record.clone());
    }

    if let Err(e) = sink.record(&record) {
        warn!(error = %e, "Result sink write failed");
    }

    Ok(record)
}

fn assemble_input(
    features: &FeatureVector,
    order: &[String],
) -> Result<Vec<f64>, InferenceError> {
    order
        .iter()
        .map(|name| {
            features
                .get(name)
                .ok_or_else(|| InferenceError::UnknownFeature(name.clone()))
        })
        .collect()
}

fn max_probability(probabilities: &[f64]) -> f64 {
    probabilities.iter().copied().fold(0.0, f64::max)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10.0_f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_NAMES, GasWindow};
    use crate::model::forest::{IsolationForest, IsolationTree};
    use crate::model::scaler::StandardScaler;
    use crate::model::tree::{DecisionTreeClassifier, NO_CHILD};
    use crate::sink::memory::MemorySink;

    /// Depth-3 classifier over `rolling_mean_10` (feature index 1) with the
    /// 220/260/300 class boundaries.
    fn classifier() -> DecisionTreeClassifier {
        DecisionTreeClassifier {
            children_left: vec![1, NO_CHILD, 3, NO_CHILD, 5, NO_CHILD, NO_CHILD],
            children_right: vec![2, NO_CHILD, 4, NO_CHILD, 6, NO_CHILD, NO_CHILD],
            feature: vec![1, -2, 1, -2, 1, -2, -2],
            threshold: vec![220.0, -2.0, 260.0, -2.0, 300.0, -2.0, -2.0],
            value: vec![
                vec![30.0, 20.0, 12.0, 8.0],
                vec![30.0, 0.0, 0.0, 0.0],
                vec![0.0, 20.0, 12.0, 8.0],
                vec![0.0, 20.0, 0.0, 0.0],
                vec![0.0, 0.0, 12.0, 8.0],
                vec![0.0, 0.0, 10.0, 0.0],
                vec![0.0, 0.0, 2.0, 8.0],
            ],
            classes: vec![0, 1, 2, 3],
        }
    }

    /// Single-tree forest over `rolling_mean_10`: values above 250 are
    /// isolated at depth 1 (anomalous), the rest land in a 4-sample leaf.
    fn outlier_model() -> IsolationForest {
        IsolationForest {
            trees: vec![IsolationTree {
                children_left: vec![1, NO_CHILD, NO_CHILD],
                children_right: vec![2, NO_CHILD, NO_CHILD],
                feature: vec![1, -2, -2],
                threshold: vec![250.0, -2.0, -2.0],
                n_node_samples: vec![5.0, 4.0, 1.0],
            }],
            max_samples: 5,
            offset: -0.5,
        }
    }

    fn identity_scaler() -> StandardScaler {
        StandardScaler {
            mean: vec![0.0; 9],
            scale: vec![1.0; 9],
        }
    }

    fn bundle() -> ModelBundle {
        ModelBundle {
            outlier: outlier_model(),
            classifier: classifier(),
            scaler: identity_scaler(),
            feature_order: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn first_features(mq: f64) -> FeatureVector {
        let mut window = GasWindow::new();
        extract(
            &mut window,
            &SensorSample {
                temp: 25.0,
                hum: 60.0,
                mq,
            },
        )
    }

    #[test]
    fn normal_sample_classifies_good_without_anomaly() {
        let bundle = bundle();
        let features = first_features(200.0);

        let (classification, anomaly) =
            run_inference(&features, &bundle).expect("inference runs");

        assert_eq!(classification.level, AqLevel::Good);
        assert_eq!(classification.confidence, 1.0);
        assert!(!anomaly.is_anomaly);
        // depth 1 + c(4) = 2.851656, c(5) = 2.327020
        assert_eq!(anomaly.score, 0.072);
    }

    #[test]
    fn isolated_sample_flags_anomaly_with_rounded_score() {
        let bundle = bundle();
        let features = first_features(400.0);

        let (classification, anomaly) =
            run_inference(&features, &bundle).expect("inference runs");

        assert_eq!(classification.level, AqLevel::Hazardous);
        assert_eq!(classification.confidence, 0.8);
        assert!(anomaly.is_anomaly);
        assert_eq!(anomaly.score, -0.242);
    }

    #[test]
    fn confidence_rounding_is_idempotent_and_bounded() {
        let bundle = bundle();
        for mq in [150.0, 240.0, 280.0, 400.0] {
            let features = first_features(mq);
            let (classification, anomaly) =
                run_inference(&features, &bundle).expect("inference runs");

            assert!((0.0..=1.0).contains(&classification.confidence));
            assert_eq!(
                round_to(classification.confidence, 2),
                classification.confidence
            );
            assert_eq!(round_to(anomaly.score, 3), anomaly.score);
        }
    }

    #[test]
    fn scaler_affects_only_the_anomaly_path() {
        let mut shifted = bundle();
        // Shift rolling_mean_10 down by 200 on the scaled path: a mean of
        // 400 now reads 200 to the outlier model, but the classifier still
        // sees the raw 400.
        shifted.scaler.mean[1] = 200.0;

        let features = first_features(400.0);
        let (base_cls, base_anomaly) =
            run_inference(&features, &bundle()).expect("inference runs");
        let (shifted_cls, shifted_anomaly) =
            run_inference(&features, &shifted).expect("inference runs");

        assert_eq!(shifted_cls, base_cls);
        assert!(base_anomaly.is_anomaly);
        assert!(!shifted_anomaly.is_anomaly);
    }

    #[test]
    fn unknown_feature_in_order_is_a_fault() {
        let mut bundle = bundle();
        bundle.feature_order[3] = "gas_delta".to_string();

        let features = first_features(200.0);
        let result = run_inference(&features, &bundle);

        assert!(matches!(
            result,
            Err(InferenceError::UnknownFeature(name)) if name == "gas_delta"
        ));
    }

    #[test]
    fn level_outside_known_set_is_a_fault() {
        let mut bundle = bundle();
        bundle.classifier.classes = vec![0, 1, 2, 7];

        let features = first_features(400.0);
        let result = run_inference(&features, &bundle);

        assert!(matches!(result, Err(InferenceError::LevelOutOfRange(7))));
    }

    #[test]
    fn pipeline_keeps_window_state_across_calls() {
        let bundle = bundle();
        let sink = MemorySink::new();
        let state = Arc::new(RwLock::new(AppState::new()));
        let sample = |mq| SensorSample {
            temp: 25.0,
            hum: 60.0,
            mq,
        };

        let first = run_pipeline(&state, &bundle, &sink, sample(200.0)).expect("first pass");
        let second = run_pipeline(&state, &bundle, &sink, sample(210.0)).expect("second pass");

        assert_eq!(first.features.rolling_mean_10, 200.0);
        assert_eq!(first.features.gas_diff, 0.0);
        assert_eq!(second.features.rolling_mean_10, 205.0);
        assert_eq!(second.features.gas_diff, 10.0);

        let guard = state.read().expect("state readable");
        assert_eq!(guard.window_fill(), 2);
        assert_eq!(guard.latest(), Some(&second));
    }

    #[test]
    fn pipeline_records_to_the_sink() {
        let bundle = bundle();
        let sink = MemorySink::new();
        let state = Arc::new(RwLock::new(AppState::new()));

        let record = run_pipeline(
            &state,
            &bundle,
            &sink,
            SensorSample {
                temp: 25.0,
                hum: 60.0,
                mq: 200.0,
            },
        )
        .expect("pipeline runs");

        assert_eq!(sink.records(), vec![record]);
    }

    #[test]
    fn sink_failure_does_not_fail_the_pipeline() {
        let bundle = bundle();
        let sink = MemorySink::failing();
        let state = Arc::new(RwLock::new(AppState::new()));

        let result = run_pipeline(
            &state,
            &bundle,
            &sink,
            SensorSample {
                temp: 25.0,
                hum: 60.0,
                mq: 200.0,
            },
        );

        assert!(result.is_ok());
        assert!(sink.records().is_empty());
    }

    #[test]
    fn poisoned_state_lock_is_reported() {
        let bundle = bundle();
        let sink = MemorySink::new();
        let state = Arc::new(RwLock::new(AppState::new()));
        let state_for_thread = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = state_for_thread.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();

        let result = run_pipeline(
            &state,
            &bundle,
            &sink,
            SensorSample {
                temp: 25.0,
                hum: 60.0,
                mq: 200.0,
            },
        );

        assert!(matches!(result, Err(AppError::StateLock)));
    }
}
