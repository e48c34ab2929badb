//! Decision-tree classifier evaluated over the exported node arrays.
//!
//! The artifact mirrors the fitted tree structure: parallel arrays indexed
//! by node id, `-1` in the children arrays marking leaves, and per-node
//! training sample counts per class. A sample is routed left when
//! `x[feature] <= threshold`, matching the split rule the tree was grown
//! with.

use crate::model::ModelError;
use serde::Deserialize;

/// Sentinel used by the export for "no child" (leaf nodes).
pub const NO_CHILD: i32 = -1;

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTreeClassifier {
    pub children_left: Vec<i32>,
    pub children_right: Vec<i32>,
    pub feature: Vec<i32>,
    pub threshold: Vec<f64>,
    /// Per-node training sample counts, one row per node, one column per class.
    pub value: Vec<Vec<f64>>,
    /// Class labels in column order of `value`.
    pub classes: Vec<i64>,
}

impl DecisionTreeClassifier {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    /// Predicted class label: the class with the largest training count at
    /// the reached leaf.
    pub fn predict(&self, input: &[f64]) -> i64 {
        let leaf = self.leaf_for(input);
        let counts = &self.value[leaf];
        let mut best = 0;
        for (index, count) in counts.iter().enumerate() {
            if *count > counts[best] {
                best = index;
            }
        }
        self.classes[best]
    }

    /// Class probabilities: the reached leaf's counts, normalized.
    pub fn predict_proba(&self, input: &[f64]) -> Vec<f64> {
        let leaf = self.leaf_for(input);
        let counts = &self.value[leaf];
        let total: f64 = counts.iter().sum();
        if total <= 0.0 {
            return vec![0.0; counts.len()];
        }
        counts.iter().map(|c| c / total).collect()
    }

    fn leaf_for(&self, input: &[f64]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != NO_CHILD {
            let feature = self.feature[node] as usize;
            node = if input[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    /// Structural checks run once at bundle load so evaluation can index
    /// without bounds surprises.
    pub fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        let n = self.node_count();
        if n == 0 {
            return Err(ModelError::Invalid("classifier has no nodes".to_string()));
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err(ModelError::Invalid(
                "classifier node arrays have inconsistent lengths".to_string(),
            ));
        }
        if self.classes.is_empty() {
            return Err(ModelError::Invalid(
                "classifier has no class labels".to_string(),
            ));
        }
        for node in 0..n {
            if self.value[node].len() != self.classes.len() {
                return Err(ModelError::Invalid(format!(
                    "classifier node {node} value row does not match class count"
                )));
            }
            let left = self.children_left[node];
            let right = self.children_right[node];
            if left == NO_CHILD {
                if right != NO_CHILD {
                    return Err(ModelError::Invalid(format!(
                        "classifier node {node} is half a leaf"
                    )));
                }
                continue;
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(ModelError::Invalid(format!(
                    "classifier node {node} splits on feature {feature} out of range"
                )));
            }
            for child in [left, right] {
                if child <= node as i32 || child as usize >= n {
                    return Err(ModelError::Invalid(format!(
                        "classifier node {node} has invalid child {child}"
                    )));
                }
            }
        }
        Ok(())
    }
}
