//! Task status results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TaskHandle, TaskStatus};

/// Outcome of a status reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOutcome {
    pub status: TaskStatus,

    /// Progress or log output of the worker, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl StatusOutcome {
    /// Create a new StatusOutcome.
    pub fn new(status: TaskStatus, info: Option<String>) -> Self {
        Self { status, info }
    }

    pub fn pending(info: impl Into<String>) -> Self {
        Self::new(TaskStatus::Pending, Some(info.into()))
    }
}

/// A generation task as reported to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Opaque task handle.
    pub task_id: TaskHandle,

    /// Current task status.
    pub status: TaskStatus,

    /// When the task was submitted.
    pub creation_date: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl TaskInfo {
    /// Create a TaskInfo for a freshly submitted task.
    pub fn submitted(task_id: TaskHandle, creation_date: DateTime<Utc>) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            creation_date,
            info: None,
        }
    }

    /// Create a TaskInfo from a reconciliation outcome.
    pub fn from_outcome(task_id: TaskHandle, creation_date: DateTime<Utc>, outcome: StatusOutcome) -> Self {
        Self {
            task_id,
            status: outcome.status,
            creation_date,
            info: outcome.info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskKey;

    #[test]
    fn test_task_info_json_shape() {
        let key = TaskKey::now("gen", "v1").unwrap();
        let info = TaskInfo::submitted(key.handle(), key.created_at);
        let value = serde_json::to_value(&info).unwrap();

        assert_eq!(value["status"], "pending");
        assert_eq!(value["task_id"], key.handle().as_str());
        assert!(value.get("info").is_none());
    }

    #[test]
    fn test_task_info_from_outcome() {
        let key = TaskKey::now("gen", "v1").unwrap();
        let outcome = StatusOutcome::new(TaskStatus::Failed, Some("no space left".to_string()));
        let info = TaskInfo::from_outcome(key.handle(), key.created_at, outcome);
        assert_eq!(info.status, TaskStatus::Failed);
        assert_eq!(info.info.as_deref(), Some("no space left"));
    }
}
