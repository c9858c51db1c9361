//! Prediction handler

use axum::{extract::{rejection::JsonRejection, State}, Json};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppState, AppError, AppResult};
use crate::models::{PredictRequest, PredictResponse};

/// Score a feature mapping and return probability, risk flag and plot
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(body) = body?;
    let request = PredictRequest::try_from(body).map_err(AppError::MalformedBody)?;

    let request_id = Uuid::new_v4();
    tracing::debug!(%request_id, "Prediction requested with {} features", request.features.len());

    // CPU bound: bounded number of runs on the blocking pool. The permit
    // lives in the blocking task, so a dropped request keeps its slot
    // until the work ends.
    let permit = state
        .limiter
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| AppError::InternalError(format!("Prediction limiter closed: {}", e)))?;

    let predictor = state.predictor.clone();
    let prediction = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        predictor.predict(&request.features)
    })
    .await??;

    let top_feature = prediction
        .explanation
        .ranked()
        .first()
        .map(|c| c.name.clone())
        .unwrap_or_default();
    tracing::info!(
        %request_id,
        prob = prediction.probability,
        is_risk = prediction.is_risk,
        defaulted = prediction.defaulted.len(),
        %top_feature,
        "Prediction served"
    );

    Ok(Json(prediction.into()))
}
