//! Model listing and creation handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use modelgen_core::TaskInfo;

use crate::error::ApiError;
use crate::service::{CreateModelRequest, ModelList};
use crate::state::AppState;

/// List models generated by a generator.
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Path((generator, tag)): Path<(String, String)>,
) -> Result<Json<ModelList>, ApiError> {
    state
        .catalog
        .list_models(&generator, &tag)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_task(e, "Failed to list models"))
}

/// Start generating a new model. Answers 202 with the pending task.
pub async fn create_model(
    State(state): State<Arc<AppState>>,
    Path((generator, tag)): Path<(String, String)>,
    payload: Result<Json<CreateModelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskInfo>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let task = state
        .creation
        .create(&generator, &tag, request)
        .await
        .map_err(|e| ApiError::from_task(e, "Creation of new model failed"))?;

    Ok((StatusCode::ACCEPTED, Json(task)))
}
