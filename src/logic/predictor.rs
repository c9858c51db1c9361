//! Predictor - one request from feature mapping to explained prediction
//!
//! Holds the classifier, the explainer built from it and the plot
//! renderer. Everything here is immutable after startup and shared
//! behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::explain::{ExplainError, Explanation, PlotConfig, SummaryPlot, TreeExplainer};
use super::features::{FeatureError, FeatureVector, MissingFeaturePolicy};
use super::model::{Classifier, InferenceError, RiskThreshold};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("explanation failed: {0}")]
    Explain(#[from] ExplainError),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Settings that shape a prediction, all from process configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictorOptions {
    pub missing_features: MissingFeaturePolicy,
    pub threshold: RiskThreshold,
    pub plot: PlotConfig,
}

/// Prediction output
#[derive(Debug, Clone)]
pub struct Prediction {
    pub probability: f64,
    pub is_risk: bool,
    pub explanation: Explanation,
    pub image_png: Vec<u8>,
    pub defaulted: Vec<&'static str>,
}

/// Static description of the loaded model, for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub model_type: &'static str,
    pub model_path: String,
    pub tree_count: usize,
    pub max_depth: usize,
    pub feature_names: Vec<String>,
    pub layout_version: u8,
    pub layout_hash: u32,
    pub expected_value: f64,
    pub output_space: super::explain::OutputSpace,
    pub risk_threshold: f64,
    pub missing_features: MissingFeaturePolicy,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
    pub inference_count: u64,
    pub avg_latency_ms: f64,
}

// ============================================================================
// PREDICTOR
// ============================================================================

#[derive(Debug)]
pub struct Predictor {
    classifier: Arc<Classifier>,
    explainer: TreeExplainer,
    plot: SummaryPlot,
    options: PredictorOptions,
}

impl Predictor {
    pub fn new(classifier: Arc<Classifier>, options: PredictorOptions) -> Self {
        let explainer = TreeExplainer::new(classifier.clone());
        Self {
            classifier,
            explainer,
            plot: SummaryPlot::new(options.plot),
            options,
        }
    }

    /// Load the artifact and build everything that depends on it
    pub fn load(path: impl AsRef<Path>, options: PredictorOptions) -> Result<Self, InferenceError> {
        let classifier = Classifier::load(path)?;
        Ok(Self::new(Arc::new(classifier), options))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn options(&self) -> &PredictorOptions {
        &self.options
    }

    /// Score a client feature mapping
    pub fn predict(&self, features: &Map<String, Value>) -> Result<Prediction, PredictError> {
        let built = FeatureVector::from_map(features, self.options.missing_features)?;
        if !built.defaulted.is_empty() {
            tracing::debug!("Defaulted missing features to 0: {:?}", built.defaulted);
        }
        tracing::trace!(features = %built.vector.to_log_entry(), "Feature vector built");

        let probability = self.classifier.predict_proba(&built.vector)?;
        let is_risk = self.options.threshold.is_risk(probability);

        let explanation = self.explainer.explain(&built.vector)?;
        let image_png = self.plot.render_png(&explanation, probability)?;

        tracing::debug!(
            "Prediction: prob={:.4} is_risk={} image={} bytes",
            probability,
            is_risk,
            image_png.len()
        );

        Ok(Prediction {
            probability,
            is_risk,
            explanation,
            image_png,
            defaulted: built.defaulted,
        })
    }

    pub fn status(&self) -> ModelStatus {
        let metadata = self.classifier.metadata();
        let layout = super::features::LayoutInfo::current();
        let stats = self.classifier.stats();

        ModelStatus {
            model_type: metadata.model_type.as_str(),
            model_path: metadata.model_path.clone(),
            tree_count: metadata.tree_count,
            max_depth: metadata.max_depth,
            feature_names: layout.feature_names,
            layout_version: layout.version,
            layout_hash: layout.hash,
            expected_value: self.explainer.expected_value(),
            output_space: self.explainer.output_space(),
            risk_threshold: self.options.threshold.threshold,
            missing_features: self.options.missing_features,
            loaded_at: metadata.loaded_at,
            inference_count: stats.count(),
            avg_latency_ms: stats.avg_latency_ms(),
        }
    }
}
