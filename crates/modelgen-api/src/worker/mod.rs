//! Worker process control.
//!
//! Each generation task runs in its own isolated worker process. The
//! [`WorkerControl`] trait is the seam between the services and the process
//! runtime; [`DockerCli`] implements it on top of the `docker` binary.

mod docker;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use modelgen_core::WorkerRecord;

pub use docker::DockerCli;

/// Worker control errors.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Failed to spawn the runtime binary.
    #[error("Failed to spawn worker runtime: {0}")]
    Spawn(#[from] std::io::Error),

    /// The runtime command exited with an error.
    #[error("Worker runtime command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The runtime produced output that could not be parsed.
    #[error("Failed to parse worker runtime output: {0}")]
    Parse(String),

    /// No worker with this name exists.
    #[error("Worker not found: {0}")]
    NotFound(String),
}

/// A bind mount into a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

/// Everything needed to start a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    /// Worker name; must be unique per task.
    pub name: String,

    /// Image to run.
    pub image: String,

    /// Environment passed to the worker.
    pub env: BTreeMap<String, String>,

    pub volumes: Vec<VolumeMount>,

    /// Remove the worker as soon as it exits. Logs are lost.
    pub auto_remove: bool,
}

/// Operations on the worker process runtime.
#[async_trait]
pub trait WorkerControl: Send + Sync {
    /// List workers whose name matches `name` exactly.
    async fn list_workers(&self, name: &str, include_exited: bool) -> Result<Vec<WorkerRecord>, WorkerError>;

    /// Output of a worker, optionally only the last `tail` lines.
    async fn logs(&self, name: &str, tail: Option<usize>) -> Result<String, WorkerError>;

    /// Start a detached worker.
    async fn start_worker(&self, spec: &WorkerSpec) -> Result<WorkerRecord, WorkerError>;

    /// Current state of a worker.
    async fn inspect(&self, name: &str) -> Result<WorkerRecord, WorkerError>;

    /// Authenticate the runtime against an image registry.
    async fn login(&self, registry: &str, username: &str, password: &str) -> Result<(), WorkerError>;
}
