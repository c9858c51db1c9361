//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! The classifier artifact carries its own `feature_names`; it is only
//! accepted when they match this layout exactly.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when layout changes
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in the exact order the classifier was trained with
pub const FEATURE_LAYOUT: &[&str] = &[
    "age",       // 0: Age in years
    "sex",       // 1: 1 = male, 0 = female
    "cp",        // 2: Chest pain type
    "trestbps",  // 3: Resting blood pressure (mm Hg)
    "chol",      // 4: Serum cholesterol (mg/dl)
    "fbs",       // 5: Fasting blood sugar > 120 mg/dl
    "restecg",   // 6: Resting ECG result
    "thalach",   // 7: Maximum heart rate achieved
    "exang",     // 8: Exercise induced angina
    "oldpeak",   // 9: ST depression induced by exercise
    "slope",     // 10: Slope of the peak exercise ST segment
    "ca",        // 11: Major vessels colored by fluoroscopy
    "thal",      // 12: Thalassemia
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 13;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
pub fn compute_layout_hash() -> u32 {
    compute_hash_for(FEATURE_VERSION, FEATURE_LAYOUT)
}

/// Hash an arbitrary (version, names) pair the same way the layout is hashed
pub fn compute_hash_for<S: AsRef<str>>(version: u8, names: &[S]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[version]);

    for name in names {
        hasher.update(name.as_ref().as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// Get layout hash
pub fn layout_hash() -> u32 {
    compute_layout_hash()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Error when a set of feature names doesn't match the layout
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Feature layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), \
     got hash {actual_hash:08x} for {actual_names:?}"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_hash: u32,
    pub actual_names: Vec<String>,
}

/// Validate that a list of names (e.g. from a model artifact) matches the layout
pub fn validate_feature_names(names: &[String]) -> Result<(), LayoutMismatchError> {
    let matches = names.len() == FEATURE_COUNT
        && names.iter().zip(FEATURE_LAYOUT).all(|(a, b)| a == b);

    if !matches {
        return Err(LayoutMismatchError {
            expected_version: FEATURE_VERSION,
            expected_hash: layout_hash(),
            actual_hash: compute_hash_for(FEATURE_VERSION, names),
            actual_names: names.to_vec(),
        });
    }

    Ok(())
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name (O(n) but features are few)
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

// ============================================================================
// TESTS
// ============================================================================
