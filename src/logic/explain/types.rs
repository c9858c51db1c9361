use serde::{Deserialize, Serialize};

/// Units the attributions are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSpace {
    Probability,
    LogOdds,
}

impl OutputSpace {
    pub fn axis_label(&self) -> &'static str {
        match self {
            OutputSpace::Probability => "SHAP value (impact on predicted probability)",
            OutputSpace::LogOdds => "SHAP value (impact on log-odds)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub name: String,
    pub value: f64,
    pub shap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub expected_value: f64,
    pub output_space: OutputSpace,
    /// One entry per feature, in layout order
    pub contributions: Vec<FeatureContribution>,
}

impl Explanation {
    /// Contributions by decreasing magnitude; ties keep layout order
    pub fn ranked(&self) -> Vec<&FeatureContribution> {
        let mut ranked: Vec<&FeatureContribution> = self.contributions.iter().collect();
        ranked.sort_by(|a, b| b.shap.abs().total_cmp(&a.shap.abs()));
        ranked
    }

    /// expected_value + Σ shap; equals the model's raw output for the row
    pub fn reconstructed_output(&self) -> f64 {
        self.expected_value + self.contributions.iter().map(|c| c.shap).sum::<f64>()
    }
}
