//! Inference artifact loading.
//!
//! The offline training job exports four JSON artifacts into one directory:
//! the isolation-forest outlier model, the decision-tree classifier, the
//! standard scaler, and the ordered feature-name list the models were
//! trained on. The bundle is loaded once at startup, validated, and shared
//! read-only for the process lifetime. The service must not serve inference
//! requests without a complete bundle.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod forest;
pub mod scaler;
pub mod tree;

use forest::IsolationForest;
use scaler::StandardScaler;
use tree::DecisionTreeClassifier;

pub const ANOMALY_MODEL_FILE: &str = "anomaly_model.json";
pub const CLASSIFIER_FILE: &str = "aq_classifier.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const FEATURES_FILE: &str = "features.json";

#[derive(Debug)]
pub struct ModelBundle {
    pub outlier: IsolationForest,
    pub classifier: DecisionTreeClassifier,
    pub scaler: StandardScaler,
    pub feature_order: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid model bundle: {0}")]
    Invalid(String),
}

/// Loads and validates all four artifacts from `dir`.
pub fn load_bundle_from_dir(dir: impl AsRef<Path>) -> Result<ModelBundle, ModelError> {
    let dir = dir.as_ref();
    let outlier: IsolationForest = read_artifact(&dir.join(ANOMALY_MODEL_FILE))?;
    let classifier: DecisionTreeClassifier = read_artifact(&dir.join(CLASSIFIER_FILE))?;
    let scaler: StandardScaler = read_artifact(&dir.join(SCALER_FILE))?;
    let feature_order: Vec<String> = read_artifact(&dir.join(FEATURES_FILE))?;

    let bundle = ModelBundle {
        outlier,
        classifier,
        scaler,
        feature_order,
    };
    bundle.validate()?;
    Ok(bundle)
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl ModelBundle {
    /// Cross-artifact consistency checks. A bundle that passes can be
    /// evaluated without bounds checks at inference time.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_order.is_empty() {
            return Err(ModelError::Invalid("feature order is empty".to_string()));
        }
        let n_features = self.feature_order.len();
        if self.scaler.mean.len() != n_features || self.scaler.scale.len() != n_features {
            return Err(ModelError::Invalid(format!(
                "scaler dimensionality {} does not match {} features",
                self.scaler.len(),
                n_features
            )));
        }
        self.classifier.validate(n_features)?;
        self.outlier.validate(n_features)?;
        Ok(())
    }
}
