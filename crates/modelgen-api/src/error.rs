//! Service and HTTP error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use modelgen_core::CoreError;
use modelgen_repo_client::RepoError;

use crate::worker::WorkerError;

/// Errors raised by the task services.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Invalid or malformed identifiers supplied by the caller.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("model generator not found: {generator}:{tag}")]
    GeneratorNotFound { generator: String, tag: String },

    #[error("model generator info invalid (labels missing): {generator}:{tag}")]
    InvalidGenerator { generator: String, tag: String },

    #[error("unknown parameter ({0})")]
    UnknownParameter(String),

    #[error("generator registry not configured: {0}")]
    RegistryNotConfigured(String),

    /// Published model metadata carries no `CREATED` label.
    #[error("creation date missing in model meta information for {model}")]
    MissingCreationTimestamp { model: String },

    #[error("invalid creation date '{value}' in model meta information for {model}")]
    InvalidCreationTimestamp { model: String, value: String },

    /// More than one worker matches a derived worker name.
    #[error("task is not unique: {count} workers named {worker}")]
    NonUniqueTask { worker: String, count: usize },

    #[error("worker {worker} did not start within {timeout_secs}s")]
    StartupTimeout { worker: String, timeout_secs: u64 },

    #[error("failed to start the generator (worker {worker})")]
    StartupFailed { worker: String, logs: Option<String> },

    #[error("repository error while {context}: {source}")]
    Repository {
        context: String,
        #[source]
        source: RepoError,
    },

    #[error("worker error while {context}: {source}")]
    Worker {
        context: String,
        #[source]
        source: WorkerError,
    },
}

impl TaskError {
    pub fn repository(context: impl Into<String>, source: RepoError) -> Self {
        Self::Repository {
            context: context.into(),
            source,
        }
    }

    pub fn worker(context: impl Into<String>, source: WorkerError) -> Self {
        Self::Worker {
            context: context.into(),
            source,
        }
    }

    /// Whether the error breaks an invariant of the surrounding system.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            TaskError::MissingCreationTimestamp { .. }
                | TaskError::InvalidCreationTimestamp { .. }
                | TaskError::NonUniqueTask { .. }
        )
    }
}

/// RFC 7807 problem body.
#[derive(Debug, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: &'static str,
    pub title: &'static str,
    pub status: u16,
    pub detail: String,
}

/// HTTP-facing errors.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest { detail: String },
    NotFound { detail: String },
    Internal { detail: String },
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal {
            detail: detail.into(),
        }
    }

    /// Map a service error to a response, with `action` describing the
    /// failed operation for the generic 500 detail.
    pub fn from_task(err: TaskError, action: &str) -> Self {
        match err {
            TaskError::Core(e) => ApiError::bad_request(e.to_string()),
            TaskError::UnknownParameter(name) => ApiError::bad_request(format!(
                "Invalid model generator parameters: unknown parameter ({})",
                name
            )),
            TaskError::GeneratorNotFound { .. } => ApiError::NotFound {
                detail: "Model generator not found".to_string(),
            },
            TaskError::InvalidGenerator { .. } => {
                ApiError::internal("Model generator info invalid (labels missing)")
            }
            TaskError::StartupFailed { worker, logs } => {
                warn!(worker = %worker, "Generator exited during startup");
                match logs {
                    Some(logs) => ApiError::internal(format!(
                        "{}: failed to start the generator: {}",
                        action, logs
                    )),
                    None => ApiError::internal(format!("{}: failed to start the generator", action)),
                }
            }
            TaskError::StartupTimeout { worker, timeout_secs } => {
                warn!(worker = %worker, timeout_secs, "Generator startup timed out");
                ApiError::internal(format!("{}: timeout", action))
            }
            other => {
                error!(
                    error = %other,
                    integrity_fault = other.is_integrity_fault(),
                    "{}",
                    action
                );
                ApiError::internal(action.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title, detail) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "No authorization token provided or token is invalid".to_string(),
            ),
            ApiError::BadRequest { detail } => (StatusCode::BAD_REQUEST, "Bad Request", detail),
            ApiError::NotFound { detail } => (StatusCode::NOT_FOUND, "Not Found", detail),
            ApiError::Internal { detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                detail,
            ),
        };

        let body = Problem {
            problem_type: "about:blank",
            title,
            status: status.as_u16(),
            detail,
        };

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/problem+json")],
            Json(body),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let err = TaskError::from(CoreError::MalformedIdentifier("bad".to_string()));
        assert!(matches!(
            ApiError::from_task(err, "Failed to retrieve task information"),
            ApiError::BadRequest { .. }
        ));

        let err = TaskError::UnknownParameter("EPOCHS".to_string());
        match ApiError::from_task(err, "Creation of new model failed") {
            ApiError::BadRequest { detail } => assert!(detail.contains("EPOCHS")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_integrity_faults_do_not_leak_detail() {
        let err = TaskError::NonUniqueTask {
            worker: "abc".to_string(),
            count: 2,
        };
        assert!(err.is_integrity_fault());

        match ApiError::from_task(err, "Failed to retrieve task information") {
            ApiError::Internal { detail } => {
                assert_eq!(detail, "Failed to retrieve task information");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_generator_not_found_is_404() {
        let err = TaskError::GeneratorNotFound {
            generator: "gen".to_string(),
            tag: "v1".to_string(),
        };
        let response = ApiError::from_task(err, "x").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_problem_response_shape() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "application/problem+json"
        );
    }
}
