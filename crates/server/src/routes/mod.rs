use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use shared::{ArConfig, ModelSpec};

use crate::AppState;

/// Health check
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Full client configuration
pub async fn config(State(state): State<AppState>) -> Json<ArConfig> {
    Json(state.config.as_ref().clone())
}

/// Gallery listing
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelSpec>> {
    Json(state.config.models.clone())
}

pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ModelSpec>, StatusCode> {
    match state.config.model(&id) {
        Some(spec) => Ok(Json(spec.clone())),
        None => {
            tracing::debug!("Unknown model requested: {id}");
            Err(StatusCode::NOT_FOUND)
        }
    }
}
