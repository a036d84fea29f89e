//! Bearer token authentication.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ApiError;
use crate::http::responses::AuthInfo;
use crate::state::AppState;

/// Hash a token using SHA-256.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

/// Reject requests without the configured bearer token.
///
/// Authorized requests carry an [`AuthInfo`] extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let authorized = bearer_token(req.headers())
        .map(hash_token)
        .is_some_and(|hash| hash == state.token_hash);

    if !authorized {
        warn!(path = %req.uri().path(), "Rejected unauthorized request");
        return ApiError::Unauthorized.into_response();
    }

    req.extensions_mut().insert(AuthInfo {
        authorized: true,
        auth_time: Utc::now(),
    });
    next.run(req).await
}
