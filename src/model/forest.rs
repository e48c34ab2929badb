//! Isolation forest scoring over the exported tree ensembles.
//!
//! Each tree is the same parallel-array export the classifier uses, plus the
//! per-node training sample counts the path-length correction needs. The
//! continuous score follows the isolation-forest convention: a sample's path
//! length through each tree is averaged, normalized by the expected path
//! length for the training subsample size, and mapped through
//! `-2^(-depth / c(n))`. The training job records the decision offset, so
//! `decision_function` values below zero are outliers.

use crate::model::ModelError;
use crate::model::tree::NO_CHILD;
use serde::Deserialize;

/// Discrete label the ensemble assigns to outliers.
pub const OUTLIER_LABEL: i64 = -1;
/// Discrete label for inliers.
pub const INLIER_LABEL: i64 = 1;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Deserialize)]
pub struct IsolationTree {
    pub children_left: Vec<i32>,
    pub children_right: Vec<i32>,
    pub feature: Vec<i32>,
    pub threshold: Vec<f64>,
    pub n_node_samples: Vec<f64>,
}

impl IsolationTree {
    /// Edges from the root to the reached leaf, plus the average path
    /// length correction for the training samples isolated at that leaf.
    fn path_length(&self, input: &[f64]) -> f64 {
        let mut node = 0usize;
        let mut depth = 0.0;
        while self.children_left[node] != NO_CHILD {
            let feature = self.feature[node] as usize;
            node = if input[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
            depth += 1.0;
        }
        depth + average_path_length(self.n_node_samples[node])
    }

    fn validate(&self, index: usize, n_features: usize) -> Result<(), ModelError> {
        let n = self.children_left.len();
        if n == 0 {
            return Err(ModelError::Invalid(format!(
                "isolation tree {index} has no nodes"
            )));
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.n_node_samples.len() != n
        {
            return Err(ModelError::Invalid(format!(
                "isolation tree {index} node arrays have inconsistent lengths"
            )));
        }
        for node in 0..n {
            if self.n_node_samples[node] < 0.0 {
                return Err(ModelError::Invalid(format!(
                    "isolation tree {index} node {node} has negative sample count"
                )));
            }
            let left = self.children_left[node];
            let right = self.children_right[node];
            if left == NO_CHILD {
                if right != NO_CHILD {
                    return Err(ModelError::Invalid(format!(
                        "isolation tree {index} node {node} is half a leaf"
                    )));
                }
                continue;
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(ModelError::Invalid(format!(
                    "isolation tree {index} node {node} splits on feature {feature} out of range"
                )));
            }
            for child in [left, right] {
                if child <= node as i32 || child as usize >= n {
                    return Err(ModelError::Invalid(format!(
                        "isolation tree {index} node {node} has invalid child {child}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IsolationForest {
    pub trees: Vec<IsolationTree>,
    /// Subsample size each tree was grown on.
    pub max_samples: usize,
    /// Decision offset fitted from the training contamination.
    pub offset: f64,
}

impl IsolationForest {
    /// Continuous score in `[-1, 0)`; lower means more isolated.
    pub fn score_samples(&self, input: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.path_length(input)).sum();
        let mean_depth = total / self.trees.len() as f64;
        let expected = average_path_length(self.max_samples as f64);
        -(2.0_f64.powf(-mean_depth / expected))
    }

    /// Score shifted by the trained offset; negative values are outliers.
    pub fn decision_function(&self, input: &[f64]) -> f64 {
        self.score_samples(input) - self.offset
    }

    pub fn predict(&self, input: &[f64]) -> i64 {
        if self.decision_function(input) < 0.0 {
            OUTLIER_LABEL
        } else {
            INLIER_LABEL
        }
    }

    pub fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid(
                "isolation forest has no trees".to_string(),
            ));
        }
        if self.max_samples < 2 {
            return Err(ModelError::Invalid(
                "isolation forest max_samples must be at least 2".to_string(),
            ));
        }
        if !self.offset.is_finite() {
            return Err(ModelError::Invalid(
                "isolation forest offset is not finite".to_string(),
            ));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(index, n_features)?;
        }
        Ok(())
    }
}

/// Expected unsuccessful-search path length in a binary search tree over
/// `n` samples: `2(ln(n-1) + gamma) - 2(n-1)/n`, with the small-n cases
/// pinned to 0 and 1.
fn average_path_length(n: f64) -> f64 {
    if n <= 1.0 {
        0.0
    } else if n <= 2.0 {
        1.0
    } else {
        2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
    }
}
