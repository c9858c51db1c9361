//! Prediction request/response bodies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::logic::explain::plot::to_base64;
use crate::logic::Prediction;

/// `POST /api/predict` body. A body without `features` means "no features".
#[derive(Debug, Default)]
pub struct PredictRequest {
    pub features: Map<String, Value>,
}

impl TryFrom<Value> for PredictRequest {
    type Error = String;

    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut body) = body else {
            return Err("request body must be a JSON object".to_string());
        };

        match body.remove("features") {
            None => Ok(Self::default()),
            Some(Value::Object(features)) => Ok(Self { features }),
            Some(_) => Err("'features' must be a JSON object".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prob: f64,
    pub is_risk: bool,
    pub shap_base64: String,
}

impl From<Prediction> for PredictResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            prob: prediction.probability,
            is_risk: prediction.is_risk,
            shap_base64: to_base64(&prediction.image_png),
        }
    }
}
