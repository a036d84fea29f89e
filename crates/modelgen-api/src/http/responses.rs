//! HTTP request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Authentication types
// ============================================================================

/// Authentication info of the current request.
#[derive(Debug, Clone, Serialize)]
pub struct AuthInfo {
    pub authorized: bool,
    pub auth_time: DateTime<Utc>,
}

// ============================================================================
// Task types
// ============================================================================

/// Query of the task status endpoint.
#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    /// Name of the model the task generates.
    pub model_name: String,

    /// Tag of the model the task generates.
    pub model_tag: String,
}
