//! Status enums for generation tasks and worker processes.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a model generation task.
///
/// Never stored; always derived from the worker process and the
/// repository metadata at the time of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task has not yet finished.
    Pending,
    /// Task finished and its model image is published.
    Finished,
    /// A newer task has published a model image over this task's result.
    Superseded,
    /// Task ended without publishing a new model image.
    Failed,
}

impl TaskStatus {
    /// Classify a finished task by comparing the published image's creation
    /// date with the task's own creation date.
    ///
    /// A strictly newer image wins regardless of how this task itself ended.
    pub fn from_creation_dates(image_created_at: DateTime<Utc>, task_created_at: DateTime<Utc>) -> Self {
        match image_created_at.cmp(&task_created_at) {
            Ordering::Less => Self::Failed,
            Ordering::Equal => Self::Finished,
            Ordering::Greater => Self::Superseded,
        }
    }

    /// Returns true if the task will not change status any more.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Finished => "finished",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a worker process as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    /// Any state string the runtime reports that is not listed above.
    Other(String),
}

impl WorkerState {
    /// Parse a runtime state string (`running`, `exited`, ...).
    pub fn parse(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if the process has ended and will produce no more output.
    pub fn is_exited(&self) -> bool {
        matches!(self, Self::Exited)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
