//! Features Module - fixed clinical feature schema and vector construction

pub mod layout;
pub mod vector;

// Re-export common types
pub use layout::{LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT};
pub use vector::{FeatureError, FeatureVector, MissingFeaturePolicy};
