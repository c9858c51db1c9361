//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_ASSETS_DIR, DEFAULT_MAX_CONCURRENT_PREDICTIONS, DEFAULT_MODEL_PATH, DEFAULT_PORT,
};
use crate::logic::explain::plot::{DEFAULT_PLOT_HEIGHT, DEFAULT_PLOT_WIDTH};
use crate::logic::explain::PlotConfig;
use crate::logic::features::MissingFeaturePolicy;
use crate::logic::model::RiskThreshold;
use crate::logic::PredictorOptions;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Classifier artifact path
    pub model_path: PathBuf,

    /// Directory served under /assets
    pub assets_dir: PathBuf,

    /// How absent features are handled
    pub missing_features: MissingFeaturePolicy,

    /// Upper bound on predictions running at once
    pub max_concurrent_predictions: usize,

    /// Explanation image size
    pub plot: PlotConfig,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing_features = match lookup("MISSING_FEATURES") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, using default", e);
                MissingFeaturePolicy::default()
            }),
            None => MissingFeaturePolicy::default(),
        };

        Self {
            port: parse_var(&lookup, "PORT").unwrap_or(DEFAULT_PORT),

            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),

            assets_dir: lookup("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),

            missing_features,

            max_concurrent_predictions: parse_var(&lookup, "MAX_CONCURRENT_PREDICTIONS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_PREDICTIONS),

            plot: PlotConfig {
                width: parse_var(&lookup, "PLOT_WIDTH").unwrap_or(DEFAULT_PLOT_WIDTH),
                height: parse_var(&lookup, "PLOT_HEIGHT").unwrap_or(DEFAULT_PLOT_HEIGHT),
            },

            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn predictor_options(&self) -> PredictorOptions {
        PredictorOptions {
            missing_features: self.missing_features,
            threshold: RiskThreshold::default(),
            plot: self.plot,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
