//! Tree Explainer - exact TreeSHAP attributions
//!
//! Path-dependent TreeSHAP (Lundberg et al., 2018): walks each tree once,
//! tracking for every feature on the current root-to-node path the share
//! of coalitions that would follow the path with the feature known
//! (`one_fraction`) or unknown (`zero_fraction`, the cover ratio).
//! Cost is O(leaves * depth^2) per tree instead of enumerating coalitions.

use std::sync::Arc;

use crate::logic::features::{FeatureVector, FEATURE_COUNT, FEATURE_LAYOUT};
use crate::logic::model::{Classifier, ModelType, Tree};
use super::types::{Explanation, FeatureContribution, OutputSpace};
use super::ExplainError;

/// Explainer bound to one classifier. Built once, shared by all requests.
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    classifier: Arc<Classifier>,
    expected_value: f64,
}

impl TreeExplainer {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        let tree_sum: f64 = classifier.trees().iter().map(Tree::expected_value).sum();
        let expected_value = combine(&classifier, tree_sum);

        tracing::debug!("Tree explainer ready, expected value {:.4}", expected_value);

        Self {
            classifier,
            expected_value,
        }
    }

    /// Model output with no feature known
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    pub fn output_space(&self) -> OutputSpace {
        match self.classifier.model_type() {
            ModelType::RandomForest => OutputSpace::Probability,
            ModelType::GradientBoosting => OutputSpace::LogOdds,
        }
    }

    /// Raw attribution per feature, in layout order
    pub fn shap_values(&self, x: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut phi = [0.0; FEATURE_COUNT];
        for tree in self.classifier.trees() {
            tree_shap(tree, x.as_slice(), &mut phi);
        }

        let scale = match self.classifier.model_type() {
            ModelType::RandomForest => 1.0 / self.classifier.trees().len() as f64,
            ModelType::GradientBoosting => self.classifier.learning_rate(),
        };
        for v in &mut phi {
            *v *= scale;
        }
        phi
    }

    pub fn explain(&self, x: &FeatureVector) -> Result<Explanation, ExplainError> {
        let phi = self.shap_values(x);
        if phi.iter().any(|v| !v.is_finite()) {
            return Err(ExplainError::NonFiniteAttribution);
        }

        let contributions = FEATURE_LAYOUT
            .iter()
            .zip(x.as_slice())
            .zip(phi)
            .map(|((name, &value), shap)| FeatureContribution {
                name: name.to_string(),
                value,
                shap,
            })
            .collect();

        Ok(Explanation {
            expected_value: self.expected_value,
            output_space: self.output_space(),
            contributions,
        })
    }
}

/// Turn a sum of per-tree outputs into the ensemble's raw output
fn combine(classifier: &Classifier, tree_sum: f64) -> f64 {
    match classifier.model_type() {
        ModelType::RandomForest => tree_sum / classifier.trees().len() as f64,
        ModelType::GradientBoosting => classifier.base_score() + classifier.learning_rate() * tree_sum,
    }
}

// ============================================================================
// TREESHAP
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Add one tree's attributions for `x` into `phi`
fn tree_shap(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    recurse(tree, x, phi, 0, &[], 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    x: &[f64],
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut depth = parent_path.len();
    let mut path = Vec::with_capacity(depth + 1);
    path.extend_from_slice(parent_path);
    path.push(PathElement::default());
    extend_path(&mut path, depth, zero_fraction, one_fraction, feature);

    if tree.is_leaf(node) {
        let leaf = tree.value(node);
        for i in 1..=depth {
            let w = unwound_path_sum(&path, depth, i);
            let el = path[i];
            if let Some(f) = el.feature {
                phi[f] += w * (el.one_fraction - el.zero_fraction) * leaf;
            }
        }
        return;
    }

    let split = tree.feature(node);
    let hot = tree.next(node, x);
    let cold = if hot == tree.left(node) {
        tree.right(node)
    } else {
        tree.left(node)
    };

    let total = tree.cover(hot) + tree.cover(cold);
    let hot_zero = tree.cover(hot) / total;
    let cold_zero = tree.cover(cold) / total;

    // A feature already on the path is folded into this split instead.
    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    if let Some(k) = (1..=depth).find(|&k| path[k].feature == Some(split)) {
        incoming_zero = path[k].zero_fraction;
        incoming_one = path[k].one_fraction;
        unwind_path(&mut path, depth, k);
        depth -= 1;
    }

    recurse(tree, x, phi, hot, &path[..=depth], hot_zero * incoming_zero, incoming_one, Some(split));
    recurse(tree, x, phi, cold, &path[..=depth], cold_zero * incoming_zero, 0.0, Some(split));
}

fn extend_path(
    path: &mut [PathElement],
    depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    path[depth] = PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    };

    let d1 = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / d1;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / d1;
    }
}

fn unwind_path(path: &mut [PathElement], depth: usize, index: usize) {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let d1 = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * d1 / ((i + 1) as f64 * one);
            next_one_portion = tmp - path[i].pweight * zero * (depth - i) as f64 / d1;
        } else {
            path[i].pweight = path[i].pweight * d1 / (zero * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

/// Total permutation weight of the path with element `index` removed
fn unwound_path_sum(path: &[PathElement], depth: usize, index: usize) -> f64 {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let d1 = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = next_one_portion * d1 / ((i + 1) as f64 * one);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero * (depth - i) as f64 / d1;
        } else if zero != 0.0 {
            total += (path[i].pweight / zero) / ((depth - i) as f64 / d1);
        }
    }

    total
}
