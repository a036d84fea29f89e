//! Generator discovery handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use modelgen_core::GeneratorInfo;

use crate::error::ApiError;
use crate::service::GeneratorList;
use crate::state::AppState;

/// List generator names with their tags.
pub async fn list_generators(State(state): State<Arc<AppState>>) -> Result<Json<GeneratorList>, ApiError> {
    state
        .catalog
        .list_generators()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_task(e, "Failed to list model generators"))
}

/// Describe one generator.
pub async fn get_generator(
    State(state): State<Arc<AppState>>,
    Path((generator, tag)): Path<(String, String)>,
) -> Result<Json<GeneratorInfo>, ApiError> {
    state
        .catalog
        .generator_info(&generator, &tag)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_task(e, "Failed to retrieve model generator info"))
}
