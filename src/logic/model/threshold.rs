//! Risk Threshold
//!
//! Turns a positive-class probability into the boolean risk flag.

use serde::{Deserialize, Serialize};

/// Default decision boundary
pub const DEFAULT_RISK_THRESHOLD: f64 = 0.5;

/// Probability cut-off; a prediction is risky when strictly above it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThreshold {
    pub threshold: f64,
}

impl Default for RiskThreshold {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RISK_THRESHOLD,
        }
    }
}

impl RiskThreshold {
    pub fn is_risk(&self, probability: f64) -> bool {
        probability > self.threshold
    }
}
