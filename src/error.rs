//! Error handling

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::logic::PredictError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Request errors
    MalformedBody(String),
    ValidationError(String),

    // Resource errors
    NotFound(String),

    // Model errors
    InferenceError(String),
    ExplainError(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MalformedBody(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::InferenceError(msg) => {
                tracing::error!("Inference error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed")
            }
            AppError::ExplainError(msg) => {
                tracing::error!("Explanation error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Explanation failed")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedBody(format!("Malformed request body: {}", rejection.body_text()))
    }
}

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Feature(e) => AppError::ValidationError(e.to_string()),
            PredictError::Inference(e) => AppError::InferenceError(e.to_string()),
            PredictError::Explain(e) => AppError::ExplainError(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("Prediction task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FeatureError;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::MalformedBody("x".into()), StatusCode::BAD_REQUEST),
            (AppError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InferenceError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::ExplainError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_feature_errors_are_client_errors() {
        let err: AppError = PredictError::Feature(FeatureError::Missing(vec!["ca"])).into();
        match err {
            AppError::ValidationError(msg) => assert_eq!(msg, "missing features: ca"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
