//! Explain Module - per-prediction feature attributions and their plot

pub mod engine;
pub mod plot;
pub mod types;

pub use engine::TreeExplainer;
pub use plot::{PlotConfig, SummaryPlot};
pub use types::{Explanation, OutputSpace};

#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("attribution produced a non-finite value")]
    NonFiniteAttribution,

    #[error("failed to render explanation plot: {0}")]
    Render(String),

    #[error("failed to encode explanation image: {0}")]
    Encode(#[from] image::ImageError),
}
