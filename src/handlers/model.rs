//! Model status handler

use axum::{extract::State, Json};

use crate::AppState;
use crate::logic::ModelStatus;

/// Describe the loaded classifier and its usage counters
pub async fn status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.predictor.status())
}
