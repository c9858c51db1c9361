//! Feature Vector - Core data structure for model input
//!
//! Builds the fixed-order vector from the loosely typed JSON mapping a
//! client posts. Uses the centralized layout from `layout.rs`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::layout::{feature_index, layout_hash, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};

// ============================================================================
// MISSING FEATURE POLICY
// ============================================================================

/// What to do with layout features the client did not send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFeaturePolicy {
    /// Fill with 0.0
    #[default]
    Zero,
    /// Refuse the request
    Reject,
}

impl std::str::FromStr for MissingFeaturePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown missing-feature policy: {}", other)),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("feature '{name}' must be a number, got {found}")]
    NotNumeric { name: &'static str, found: String },

    #[error("missing features: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Feature values in the order defined by FEATURE_LAYOUT
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; FEATURE_COUNT],
}

/// A vector plus the layout names that were defaulted while building it
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltVector {
    pub vector: FeatureVector,
    pub defaulted: Vec<&'static str>,
}

impl FeatureVector {
    /// Create a zeroed feature vector
    pub fn new() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Build from a client mapping.
    ///
    /// Unknown names are skipped without looking at their values. Known
    /// names must hold a JSON number or a string that parses as a finite
    /// number.
    pub fn from_map(
        features: &Map<String, Value>,
        policy: MissingFeaturePolicy,
    ) -> Result<BuiltVector, FeatureError> {
        let mut vector = Self::new();
        let mut present = [false; FEATURE_COUNT];

        for (name, value) in features {
            let Some(index) = feature_index(name) else {
                continue;
            };
            vector.values[index] = numeric_value(FEATURE_LAYOUT[index], value)?;
            present[index] = true;
        }

        let defaulted: Vec<&'static str> = FEATURE_LAYOUT
            .iter()
            .zip(present)
            .filter(|(_, seen)| !seen)
            .map(|(name, _)| *name)
            .collect();

        if policy == MissingFeaturePolicy::Reject && !defaulted.is_empty() {
            return Err(FeatureError::Missing(defaulted));
        }

        Ok(BuiltVector { vector, defaulted })
    }

    /// Get values as slice
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Get feature by name
    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        feature_index(name).and_then(|i| self.get(i))
    }

    /// Set feature by name
    pub fn set_by_name(&mut self, name: &str, value: f64) -> bool {
        match feature_index(name) {
            Some(index) => {
                self.values[index] = value;
                true
            }
            None => false,
        }
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> Value {
        let named: Map<String, Value> = FEATURE_LAYOUT
            .iter()
            .zip(self.values.iter())
            .map(|(name, v)| (name.to_string(), serde_json::json!(v)))
            .collect();

        serde_json::json!({
            "feature_version": FEATURE_VERSION,
            "layout_hash": layout_hash(),
            "named_values": named,
        })
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

fn numeric_value(name: &'static str, value: &Value) -> Result<f64, FeatureError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    };

    parsed.ok_or_else(|| FeatureError::NotNumeric {
        name,
        found: describe(value),
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
        Value::Number(n) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_full_mapping_in_layout_order() {
        let features = map(json!({
            "thal": 1, "age": 63, "sex": 1, "cp": 3, "trestbps": 145,
            "chol": 233, "fbs": 1, "restecg": 0, "thalach": 150,
            "exang": 0, "oldpeak": 2.3, "slope": 0, "ca": 0
        }));

        let built = FeatureVector::from_map(&features, MissingFeaturePolicy::Zero).unwrap();
        assert!(built.defaulted.is_empty());
        assert_eq!(
            built.vector.values,
            [63.0, 1.0, 3.0, 145.0, 233.0, 1.0, 0.0, 150.0, 0.0, 2.3, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_missing_defaults_to_zero() {
        let built = FeatureVector::from_map(&map(json!({"age": 50})), MissingFeaturePolicy::Zero)
            .unwrap();
        assert_eq!(built.vector.get_by_name("age"), Some(50.0));
        assert_eq!(built.vector.get_by_name("ca"), Some(0.0));
        assert_eq!(built.defaulted.len(), FEATURE_COUNT - 1);
        assert_eq!(built.defaulted[0], "sex");

        let empty = FeatureVector::from_map(&Map::new(), MissingFeaturePolicy::Zero).unwrap();
        assert_eq!(empty.vector, FeatureVector::new());
    }

    #[test]
    fn test_explicit_zero_equals_absent() {
        let absent = FeatureVector::from_map(&map(json!({"age": 40})), MissingFeaturePolicy::Zero)
            .unwrap();
        let explicit = FeatureVector::from_map(
            &map(json!({"age": 40, "ca": 0, "thal": 0})),
            MissingFeaturePolicy::Zero,
        )
        .unwrap();
        assert_eq!(absent.vector, explicit.vector);
    }

    #[test]
    fn test_unknown_names_ignored() {
        let built = FeatureVector::from_map(
            &map(json!({"age": 44, "bp": 120, "max_hr": "not a number", "notes": null})),
            MissingFeaturePolicy::Zero,
        )
        .unwrap();
        assert_eq!(built.vector.get_by_name("age"), Some(44.0));
        assert_eq!(built.vector.as_slice().iter().sum::<f64>(), 44.0);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let built = FeatureVector::from_map(
            &map(json!({"slope": "1", "oldpeak": " 2.5 "})),
            MissingFeaturePolicy::Zero,
        )
        .unwrap();
        assert_eq!(built.vector.get_by_name("slope"), Some(1.0));
        assert_eq!(built.vector.get_by_name("oldpeak"), Some(2.5));
    }

    #[test]
    fn test_non_numeric_rejected() {
        for bad in [json!(null), json!(true), json!("abc"), json!([1]), json!({"v": 1}), json!("NaN")] {
            let err = FeatureVector::from_map(&map(json!({ "chol": bad })), MissingFeaturePolicy::Zero)
                .unwrap_err();
            match err {
                FeatureError::NotNumeric { name, .. } => assert_eq!(name, "chol"),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_reject_policy_lists_missing() {
        let err = FeatureVector::from_map(
            &map(json!({"age": 1, "sex": 1, "cp": 1, "trestbps": 1, "chol": 1, "fbs": 1,
                        "restecg": 1, "thalach": 1, "exang": 1, "oldpeak": 1, "slope": 1})),
            MissingFeaturePolicy::Reject,
        )
        .unwrap_err();
        assert_eq!(err, FeatureError::Missing(vec!["ca", "thal"]));
        assert_eq!(err.to_string(), "missing features: ca, thal");
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("zero".parse::<MissingFeaturePolicy>(), Ok(MissingFeaturePolicy::Zero));
        assert_eq!(" REJECT ".parse::<MissingFeaturePolicy>(), Ok(MissingFeaturePolicy::Reject));
        assert!("mean".parse::<MissingFeaturePolicy>().is_err());
    }

    #[test]
    fn test_log_entry_has_names() {
        let mut vector = FeatureVector::new();
        assert!(vector.set_by_name("thalach", 170.0));
        assert!(!vector.set_by_name("unknown", 1.0));
        let entry = vector.to_log_entry();
        assert_eq!(entry["named_values"]["thalach"], json!(170.0));
        assert_eq!(entry["layout_hash"], json!(layout_hash()));
    }
}
