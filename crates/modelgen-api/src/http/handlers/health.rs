//! Health and auth info handlers.

use axum::{response::IntoResponse, Extension, Json};

use crate::http::responses::AuthInfo;

/// Health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Authentication info of the calling token.
pub async fn auth_info(Extension(auth): Extension<AuthInfo>) -> Json<AuthInfo> {
    Json(auth)
}
