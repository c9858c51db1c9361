//! Model Module - classifier artifact loading and inference
//!
//! The artifact is loaded once at startup and shared read-only.

pub mod artifact;
pub mod inference;
pub mod threshold;

// Re-export common types
pub use artifact::{ModelType, Tree};
pub use inference::{Classifier, InferenceError};
pub use threshold::RiskThreshold;
