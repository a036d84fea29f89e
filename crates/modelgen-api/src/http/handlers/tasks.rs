//! Task status handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};

use modelgen_core::{TaskHandle, TaskInfo};

use crate::error::ApiError;
use crate::http::responses::TaskQuery;
use crate::state::AppState;

/// Current status of a generation task.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> Result<Json<TaskInfo>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let handle = TaskHandle::new(task_id);

    state
        .status
        .resolve(&handle, &query.model_name, &query.model_tag)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_task(e, "Failed to retrieve task information"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelgen_core::ids::canonical_timestamp;
    use modelgen_core::{TaskKey, TaskStatus, WorkerRecord, WorkerState};

    use crate::http::handlers::tests::test_state;
    use crate::service::testing::{FakeRepository, FakeWorkers};

    fn query() -> Result<Query<TaskQuery>, QueryRejection> {
        Ok(Query(TaskQuery {
            model_name: "model".to_string(),
            model_tag: "v2".to_string(),
        }))
    }

    #[tokio::test]
    async fn test_get_finished_task() {
        let key = TaskKey::now("gen", "v1").unwrap();
        let created = canonical_timestamp(&key.created_at);
        let repository = FakeRepository::default()
            .with_model("gen/v1/model:v2", &[("gen.v1.model.v2.CREATED", created.as_str())]);
        let state = test_state(FakeWorkers::default(), repository);

        let Json(task) = get_task(State(state), Path(key.handle().into_inner()), query())
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Finished);
        assert_eq!(task.creation_date, key.created_at);
    }

    #[tokio::test]
    async fn test_get_task_malformed_handle() {
        let state = test_state(FakeWorkers::default(), FakeRepository::default());
        let err = get_task(State(state), Path("not-base64-!!".to_string()), query())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_get_task_non_unique() {
        let key = TaskKey::now("gen", "v1").unwrap();
        let workers = FakeWorkers::with_records(vec![
            WorkerRecord::new(key.worker_name(), WorkerState::Running),
            WorkerRecord::new(key.worker_name(), WorkerState::Running),
        ]);
        let state = test_state(workers, FakeRepository::default());

        let err = get_task(State(state), Path(key.handle().into_inner()), query())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal { .. }));
    }
}
