//! Classifier artifact - on-disk tree ensemble format
//!
//! Node arrays follow scikit-learn's `tree_` layout: node `i` is a leaf
//! when `children_left[i] == -1`, otherwise samples with
//! `x[feature[i]] <= threshold[i]` go left. `cover[i]` is the number of
//! training samples that reached the node.

use serde::{Deserialize, Serialize};

use crate::logic::features::FEATURE_COUNT;
use super::inference::InferenceError;

/// Only artifact revision this build understands
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Marker used for "no child"
pub const TREE_LEAF: i64 = -1;

/// Ensemble flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Leaves hold positive-class probabilities, averaged over trees
    RandomForest,
    /// Leaves hold log-odds increments, summed then squashed
    GradientBoosting,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
            ModelType::GradientBoosting => "gradient_boosting",
        }
    }
}

/// Raw artifact document, as deserialized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_type: ModelType,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    pub trees: Vec<TreeArtifact>,
}

fn default_learning_rate() -> f64 {
    1.0
}

/// One decision tree in node-array form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
    pub cover: Vec<f64>,
}

/// A validated tree. Indices are in range and every node has at most one
/// parent, so each node is reached by exactly one root path.
#[derive(Debug, Clone)]
pub struct Tree {
    left: Vec<usize>,
    right: Vec<usize>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    value: Vec<f64>,
    cover: Vec<f64>,
    is_leaf: Vec<bool>,
}

impl Tree {
    pub fn node_count(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.is_leaf[node]
    }

    pub fn left(&self, node: usize) -> usize {
        self.left[node]
    }

    pub fn right(&self, node: usize) -> usize {
        self.right[node]
    }

    pub fn feature(&self, node: usize) -> usize {
        self.feature[node]
    }

    pub fn threshold(&self, node: usize) -> f64 {
        self.threshold[node]
    }

    pub fn value(&self, node: usize) -> f64 {
        self.value[node]
    }

    pub fn cover(&self, node: usize) -> f64 {
        self.cover[node]
    }

    /// Child taken by `x` at an internal node
    pub fn next(&self, node: usize, x: &[f64]) -> usize {
        if x[self.feature[node]] <= self.threshold[node] {
            self.left[node]
        } else {
            self.right[node]
        }
    }

    /// Leaf value reached by `x`
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut node = 0;
        while !self.is_leaf[node] {
            node = self.next(node, x);
        }
        self.value[node]
    }

    /// Cover-weighted mean leaf value, i.e. the tree's output with every
    /// feature unknown
    pub fn expected_value(&self) -> f64 {
        self.expected_from(0)
    }

    fn expected_from(&self, node: usize) -> f64 {
        if self.is_leaf[node] {
            return self.value[node];
        }
        let (l, r) = (self.left[node], self.right[node]);
        (self.cover[l] * self.expected_from(l) + self.cover[r] * self.expected_from(r))
            / (self.cover[l] + self.cover[r])
    }

    /// Deepest root-to-leaf path, in edges
    pub fn max_depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, node: usize) -> usize {
        if self.is_leaf[node] {
            0
        } else {
            1 + self.depth_from(self.left[node]).max(self.depth_from(self.right[node]))
        }
    }
}

impl TryFrom<(usize, TreeArtifact)> for Tree {
    type Error = InferenceError;

    fn try_from((index, raw): (usize, TreeArtifact)) -> Result<Self, Self::Error> {
        let invalid = |reason: String| InferenceError::InvalidTree { tree: index, reason };

        let n = raw.children_left.len();
        if n == 0 {
            return Err(invalid("tree has no nodes".to_string()));
        }
        let lengths = [
            ("children_right", raw.children_right.len()),
            ("feature", raw.feature.len()),
            ("threshold", raw.threshold.len()),
            ("value", raw.value.len()),
            ("cover", raw.cover.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(invalid(format!("{} has {} entries, expected {}", name, len, n)));
            }
        }

        let mut left = vec![0; n];
        let mut right = vec![0; n];
        let mut feature = vec![0; n];
        let mut is_leaf = vec![false; n];
        let mut has_parent = vec![false; n];

        for node in 0..n {
            if !raw.cover[node].is_finite() || raw.cover[node] <= 0.0 {
                return Err(invalid(format!("node {} has non-positive cover", node)));
            }
            if !raw.value[node].is_finite() {
                return Err(invalid(format!("node {} has a non-finite value", node)));
            }

            if raw.children_left[node] == TREE_LEAF {
                is_leaf[node] = true;
                continue;
            }

            let child = |c: i64| -> Result<usize, InferenceError> {
                // Children must come after their parent; this rules out cycles.
                if c <= node as i64 || c >= n as i64 {
                    return Err(invalid(format!("node {} has child {} out of range", node, c)));
                }
                Ok(c as usize)
            };
            left[node] = child(raw.children_left[node])?;
            right[node] = child(raw.children_right[node])?;
            if left[node] == right[node] {
                return Err(invalid(format!("node {} has identical children", node)));
            }
            for c in [left[node], right[node]] {
                if has_parent[c] {
                    return Err(invalid(format!("node {} is shared by more than one parent", c)));
                }
                has_parent[c] = true;
            }

            let f = raw.feature[node];
            if f < 0 || f >= FEATURE_COUNT as i64 {
                return Err(invalid(format!("node {} splits on unknown feature {}", node, f)));
            }
            feature[node] = f as usize;

            if !raw.threshold[node].is_finite() {
                return Err(invalid(format!("node {} has a non-finite threshold", node)));
            }
        }

        Ok(Self {
            left,
            right,
            feature,
            threshold: raw.threshold,
            value: raw.value,
            cover: raw.cover,
            is_leaf,
        })
    }
}
