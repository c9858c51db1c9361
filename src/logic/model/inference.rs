//! Inference Engine - tree ensemble classifier
//!
//! Loads the classifier artifact once and evaluates positive-class
//! probabilities. The loaded classifier is immutable; only the latency
//! counters change after startup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::logic::features::layout::{validate_feature_names, LayoutMismatchError};
use crate::logic::features::FeatureVector;
use super::artifact::{ModelArtifact, ModelType, Tree, ARTIFACT_FORMAT_VERSION};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported artifact format version {0} (expected {})", ARTIFACT_FORMAT_VERSION)]
    UnsupportedFormat(u32),

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),

    #[error("model artifact contains no trees")]
    EmptyEnsemble,

    #[error("tree {tree} is invalid: {reason}")]
    InvalidTree { tree: usize, reason: String },

    #[error("invalid model parameter: {0}")]
    InvalidParameter(String),

    #[error("model produced a non-finite output")]
    NonFiniteOutput,
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Model metadata
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub model_path: String,
    pub model_type: ModelType,
    pub tree_count: usize,
    pub max_depth: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Latency and call counters
#[derive(Debug, Default)]
pub struct InferenceStats {
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl InferenceStats {
    pub fn record(&self, elapsed_us: u64) {
        self.latency_sum_us.fetch_add(elapsed_us, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.inference_count.load(Ordering::Relaxed)
    }

    /// Average latency in milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.count();
        if count > 0 {
            (sum as f64 / count as f64) / 1000.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// A validated tree ensemble ready for inference
#[derive(Debug)]
pub struct Classifier {
    model_type: ModelType,
    base_score: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
    metadata: ModelMetadata,
    stats: InferenceStats,
}

impl Classifier {
    /// Load and validate an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        tracing::info!("Loading model artifact from: {}", path.display());

        let bytes = std::fs::read(path).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;

        let classifier = Self::from_artifact(artifact, path.display().to_string())?;

        tracing::info!(
            "Model loaded: {} with {} trees (max depth {})",
            classifier.metadata.model_type.as_str(),
            classifier.metadata.tree_count,
            classifier.metadata.max_depth,
        );

        Ok(classifier)
    }

    /// Validate an already-parsed artifact
    pub fn from_artifact(artifact: ModelArtifact, source: String) -> Result<Self, InferenceError> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(InferenceError::UnsupportedFormat(artifact.format_version));
        }

        validate_feature_names(&artifact.feature_names)?;

        if artifact.trees.is_empty() {
            return Err(InferenceError::EmptyEnsemble);
        }
        if !artifact.base_score.is_finite() {
            return Err(InferenceError::InvalidParameter(format!(
                "base_score must be finite, got {}",
                artifact.base_score
            )));
        }
        if !artifact.learning_rate.is_finite() || artifact.learning_rate <= 0.0 {
            return Err(InferenceError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                artifact.learning_rate
            )));
        }

        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(Tree::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let metadata = ModelMetadata {
            model_path: source,
            model_type: artifact.model_type,
            tree_count: trees.len(),
            max_depth: trees.iter().map(Tree::max_depth).max().unwrap_or(0),
            loaded_at: Utc::now(),
        };

        Ok(Self {
            model_type: artifact.model_type,
            base_score: artifact.base_score,
            learning_rate: artifact.learning_rate,
            trees,
            metadata,
            stats: InferenceStats::default(),
        })
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn stats(&self) -> &InferenceStats {
        &self.stats
    }

    /// Untransformed ensemble output: mean leaf probability for forests,
    /// log-odds margin for boosting
    pub fn raw_output(&self, x: &FeatureVector) -> f64 {
        let values = x.as_slice();
        let sum: f64 = self.trees.iter().map(|t| t.predict(values)).sum();

        match self.model_type {
            ModelType::RandomForest => sum / self.trees.len() as f64,
            ModelType::GradientBoosting => self.base_score + self.learning_rate * sum,
        }
    }

    /// Map a raw output into a probability
    pub fn to_probability(&self, raw: f64) -> f64 {
        match self.model_type {
            ModelType::RandomForest => raw.clamp(0.0, 1.0),
            ModelType::GradientBoosting => sigmoid(raw),
        }
    }

    /// Positive-class probability for a single row
    pub fn predict_proba(&self, x: &FeatureVector) -> Result<f64, InferenceError> {
        let start_time = Instant::now();

        let prob = self.to_probability(self.raw_output(x));
        if !prob.is_finite() {
            return Err(InferenceError::NonFiniteOutput);
        }

        self.stats.record(start_time.elapsed().as_micros() as u64);

        Ok(prob)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::io::Write;

    #[test]
    fn test_demo_forest_example_patient() {
        let model = demo_forest();
        assert_eq!(model.model_type(), ModelType::RandomForest);
        assert_eq!(model.trees().len(), 3);

        // leaves: 0.85 (cp, thalach), 0.35 (oldpeak, thal), 0.6 (exang, age)
        let prob = model.predict_proba(&example_patient()).unwrap();
        assert!((prob - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_demo_forest_all_zero() {
        let model = demo_forest();
        let prob = model.predict_proba(&FeatureVector::new()).unwrap();
        assert!((prob - (0.55 + 0.82 + 0.8) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_is_deterministic_and_counted() {
        let model = demo_forest();
        let a = model.predict_proba(&example_patient()).unwrap();
        let b = model.predict_proba(&example_patient()).unwrap();
        assert_eq!(a, b);
        assert_eq!(model.stats().count(), 2);
    }

    #[test]
    fn test_boosted_margin_and_probability() {
        let model = boosted();
        let x = example_patient(); // age 63, exang 0
        let margin = model.raw_output(&x);
        assert!((margin - (-0.2 + 0.5 * (0.4 - 0.4))).abs() < 1e-12);

        let prob = model.predict_proba(&x).unwrap();
        assert!((prob - sigmoid(margin)).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&prob));
    }

    #[test]
    fn test_sigmoid_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(-800.0).is_finite());
    }

    #[test]
    fn test_rejects_layout_mismatch() {
        let mut artifact = demo_artifact();
        artifact.feature_names.swap(0, 1);
        let err = Classifier::from_artifact(artifact, "x".into()).unwrap_err();
        assert!(matches!(err, InferenceError::Layout(_)));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut artifact = demo_artifact();
        artifact.format_version = 2;
        assert!(matches!(
            Classifier::from_artifact(artifact, "x".into()),
            Err(InferenceError::UnsupportedFormat(2))
        ));

        let mut artifact = demo_artifact();
        artifact.trees.clear();
        assert!(matches!(
            Classifier::from_artifact(artifact, "x".into()),
            Err(InferenceError::EmptyEnsemble)
        ));

        let mut artifact = demo_artifact();
        artifact.learning_rate = 0.0;
        assert!(matches!(
            Classifier::from_artifact(artifact, "x".into()),
            Err(InferenceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEMO_ARTIFACT.as_bytes()).unwrap();

        let model = Classifier::load(file.path()).unwrap();
        assert_eq!(model.metadata().tree_count, 3);
        assert_eq!(model.metadata().max_depth, 2);
    }

    #[test]
    fn test_load_errors() {
        let missing = Classifier::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(missing, InferenceError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let garbage = Classifier::load(file.path()).unwrap_err();
        assert!(matches!(garbage, InferenceError::Parse(_)));
    }
}
