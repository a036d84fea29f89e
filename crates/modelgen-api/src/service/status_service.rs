//! Task status reconciliation.
//!
//! Task state is never stored. Every status request re-derives it from the
//! worker runtime (is the worker still alive?) and the repository (was a
//! model image published, and when?).

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde_json::Value;
use tracing::{debug, info};

use modelgen_core::{
    decode_labels, extract, progress_info, validate_name, StatusOutcome, TaskHandle, TaskInfo,
    TaskKey, TaskStatus, WorkerRecord,
};
use modelgen_repo_client::ModelRepository;

use crate::error::TaskError;
use crate::worker::{WorkerControl, WorkerError};

/// Label under the model path holding the image creation date.
const CREATED_LABEL: &str = "CREATED";

/// Derives task status from worker liveness and published model metadata.
pub struct StatusService {
    workers: Arc<dyn WorkerControl>,
    repository: Arc<dyn ModelRepository>,

    /// Exited workers are kept around, so their logs can be reported.
    retain_logs: bool,

    /// Lines of output reported for a live worker.
    log_tail_lines: usize,
}

impl StatusService {
    /// Create a new StatusService.
    pub fn new(
        workers: Arc<dyn WorkerControl>,
        repository: Arc<dyn ModelRepository>,
        retain_logs: bool,
        log_tail_lines: usize,
    ) -> Self {
        Self {
            workers,
            repository,
            retain_logs,
            log_tail_lines,
        }
    }

    /// Resolve the status of the task behind `handle` for the given model.
    pub async fn resolve(
        &self,
        handle: &TaskHandle,
        model_name: &str,
        model_tag: &str,
    ) -> Result<TaskInfo, TaskError> {
        let key = handle.decode()?;
        validate_name("model name", model_name)?;
        validate_name("model tag", model_tag)?;

        let outcome = self.reconcile(&key, model_name, model_tag).await?;

        info!(
            generator = %key.generator_name,
            tag = %key.generator_tag,
            model = %model_name,
            model_tag = %model_tag,
            status = %outcome.status,
            "Task status resolved"
        );

        Ok(TaskInfo::from_outcome(handle.clone(), key.created_at, outcome))
    }

    /// Classify a task. Read-only: never starts, stops or removes a worker.
    pub async fn reconcile(
        &self,
        key: &TaskKey,
        model_name: &str,
        model_tag: &str,
    ) -> Result<StatusOutcome, TaskError> {
        let worker = key.worker_name();
        let records = self
            .workers
            .list_workers(&worker, true)
            .await
            .map_err(|e| TaskError::worker(format!("listing workers named {}", worker), e))?;

        debug!(worker = %worker, count = records.len(), "Matching workers");

        match records.as_slice() {
            [record] if !record.state.is_exited() => self.pending(record).await,
            [] | [_] => {
                self.from_repository(key, model_name, model_tag, records.first())
                    .await
            }
            _ => Err(TaskError::NonUniqueTask {
                worker,
                count: records.len(),
            }),
        }
    }

    async fn pending(&self, record: &WorkerRecord) -> Result<StatusOutcome, TaskError> {
        let tail = match self.workers.logs(&record.name, Some(self.log_tail_lines)).await {
            Ok(tail) => tail,
            // The worker exited and was removed since it was listed.
            Err(WorkerError::NotFound(_)) => String::new(),
            Err(e) => {
                return Err(TaskError::worker(
                    format!("reading output of worker {}", record.name),
                    e,
                ))
            }
        };

        Ok(StatusOutcome::pending(progress_info(&record.state, &tail)))
    }

    async fn from_repository(
        &self,
        key: &TaskKey,
        model_name: &str,
        model_tag: &str,
        record: Option<&WorkerRecord>,
    ) -> Result<StatusOutcome, TaskError> {
        let generator = key.generator_name.as_str();
        let tag = key.generator_tag.as_str();
        let model = format!("{}/{}/{}:{}", generator, tag, model_name, model_tag);

        let labels = match self
            .repository
            .model_labels(generator, tag, model_name, model_tag)
            .await
        {
            Ok(labels) => labels,
            Err(e) if e.is_not_found() => {
                debug!(model = %model, "No model image published");
                return Ok(StatusOutcome::new(TaskStatus::Failed, self.task_logs(record).await?));
            }
            Err(e) => {
                return Err(TaskError::repository(
                    format!("fetching metadata of {}", model),
                    e,
                ))
            }
        };

        let tree = decode_labels(labels);
        let parameters = extract(&tree, &[generator, tag, model_name, model_tag])?;

        let raw = match parameters.get(CREATED_LABEL) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim(),
            _ => return Err(TaskError::MissingCreationTimestamp { model }),
        };
        let image_created_at =
            parse_creation_timestamp(raw).ok_or_else(|| TaskError::InvalidCreationTimestamp {
                model: model.clone(),
                value: raw.to_string(),
            })?;

        let status = TaskStatus::from_creation_dates(image_created_at, key.created_at);
        debug!(
            model = %model,
            image_created_at = %image_created_at,
            task_created_at = %key.created_at,
            status = %status,
            "Compared creation dates"
        );

        Ok(StatusOutcome::new(status, self.task_logs(record).await?))
    }

    /// Full logs of an exited worker, if workers are retained after exit.
    async fn task_logs(&self, record: Option<&WorkerRecord>) -> Result<Option<String>, TaskError> {
        let record = match record {
            Some(record) if self.retain_logs => record,
            _ => return Ok(None),
        };

        match self.workers.logs(&record.name, None).await {
            Ok(logs) => Ok(Some(logs)),
            Err(WorkerError::NotFound(_)) => Ok(None),
            Err(e) => Err(TaskError::worker(
                format!("reading logs of worker {}", record.name),
                e,
            )),
        }
    }
}

/// Parse a `CREATED` label, truncated to microseconds.
///
/// RFC 3339 first; timestamps without offset are taken as UTC.
pub fn parse_creation_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
        })?;

    Some(parsed.trunc_subsecs(6))
}
