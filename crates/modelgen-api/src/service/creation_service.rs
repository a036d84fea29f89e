//! Model creation: start a generator worker for a new model.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use modelgen_core::ids::canonical_timestamp;
use modelgen_core::{validate_name, TaskInfo, TaskKey, WorkerRecord};

use crate::config::Config;
use crate::error::TaskError;
use crate::service::CatalogService;
use crate::worker::{VolumeMount, WorkerControl, WorkerError, WorkerSpec};

/// Mount point of the registry auth file inside a generator worker.
const WORKER_AUTH_PATH: &str = "/workspace/config.json";

/// Request body for creating a model.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateModelRequest {
    pub model_name: String,
    pub model_tag: String,

    /// Generator parameters, passed to the worker as environment.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

/// Settings of the creation flow, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct CreationSettings {
    pub registry_prefix: Option<String>,
    pub verify_tls: bool,
    pub remove_workers: bool,
    pub metagenerator_auth_config: PathBuf,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&Config> for CreationSettings {
    fn from(config: &Config) -> Self {
        Self {
            registry_prefix: config.registry_prefix.clone(),
            verify_tls: config.verify_tls,
            remove_workers: config.remove_workers,
            metagenerator_auth_config: config.metagenerator_auth_config.clone(),
            startup_timeout: config.startup_timeout,
            poll_interval: config.poll_interval,
        }
    }
}

/// Starts generator workers and hands out task handles.
pub struct CreationService {
    workers: Arc<dyn WorkerControl>,
    catalog: Arc<CatalogService>,
    settings: CreationSettings,
}

impl CreationService {
    /// Create a new CreationService.
    pub fn new(
        workers: Arc<dyn WorkerControl>,
        catalog: Arc<CatalogService>,
        settings: CreationSettings,
    ) -> Self {
        Self {
            workers,
            catalog,
            settings,
        }
    }

    /// Start generating a model and return the pending task.
    pub async fn create(
        &self,
        generator_name: &str,
        generator_tag: &str,
        request: CreateModelRequest,
    ) -> Result<TaskInfo, TaskError> {
        let generator = self
            .catalog
            .generator_info(generator_name, generator_tag)
            .await?;

        if let Some(unknown) = request
            .parameters
            .keys()
            .find(|name| !generator.accepts_parameter(name))
        {
            return Err(TaskError::UnknownParameter(unknown.clone()));
        }

        validate_name("model name", &request.model_name)?;
        validate_name("model tag", &request.model_tag)?;

        let registry_prefix = self.settings.registry_prefix.as_deref().ok_or_else(|| {
            TaskError::RegistryNotConfigured(format!("{}:{}", generator_name, generator_tag))
        })?;

        let key = TaskKey::now(generator_name, generator_tag)?;
        let spec = WorkerSpec {
            name: key.worker_name(),
            image: format!("{}/{}:{}", registry_prefix, generator_name, generator_tag),
            env: self.worker_env(&request, &key),
            volumes: vec![VolumeMount {
                host_path: self.settings.metagenerator_auth_config.clone(),
                container_path: WORKER_AUTH_PATH.to_string(),
                read_only: true,
            }],
            auto_remove: self.settings.remove_workers,
        };

        let record = match self.workers.start_worker(&spec).await {
            Ok(record) => record,
            // Auto-removed workers vanish as soon as they exit.
            Err(WorkerError::NotFound(_)) => {
                return Err(TaskError::StartupFailed {
                    worker: spec.name,
                    logs: None,
                })
            }
            Err(e) => return Err(TaskError::worker(format!("starting worker {}", spec.name), e)),
        };

        self.wait_until_running(record).await?;

        info!(
            generator = %generator_name,
            tag = %generator_tag,
            model = %request.model_name,
            model_tag = %request.model_tag,
            worker = %spec.name,
            "Model generation started"
        );

        Ok(TaskInfo::submitted(key.handle(), key.created_at))
    }

    fn worker_env(&self, request: &CreateModelRequest, key: &TaskKey) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = request
            .parameters
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect();

        env.insert("MODEL_NAME".to_string(), request.model_name.clone());
        env.insert("MODEL_TAG".to_string(), request.model_tag.clone());
        env.insert("CREATED".to_string(), canonical_timestamp(&key.created_at));

        let extra_flags = if self.settings.verify_tls {
            "--cache=true"
        } else {
            "--skip-tls-verify --cache=true"
        };
        env.insert("EXTRA_FLAGS".to_string(), extra_flags.to_string());

        env
    }

    /// Poll the worker until it runs, exits or the startup budget is spent.
    async fn wait_until_running(&self, mut record: WorkerRecord) -> Result<(), TaskError> {
        let started = Instant::now();
        let worker = record.name.clone();

        loop {
            if record.state.is_running() {
                return Ok(());
            }

            if record.state.is_exited() {
                let logs = self.startup_logs(&worker).await;
                return Err(TaskError::StartupFailed { worker, logs });
            }

            if started.elapsed() >= self.settings.startup_timeout {
                return Err(TaskError::StartupTimeout {
                    worker,
                    timeout_secs: self.settings.startup_timeout.as_secs(),
                });
            }

            debug!(worker = %worker, state = %record.state, "Waiting for worker to start");
            tokio::time::sleep(self.settings.poll_interval).await;

            record = match self.workers.inspect(&worker).await {
                Ok(record) => record,
                Err(WorkerError::NotFound(_)) => {
                    return Err(TaskError::StartupFailed { worker, logs: None })
                }
                Err(e) => {
                    return Err(TaskError::worker(format!("inspecting worker {}", worker), e))
                }
            };
        }
    }

    async fn startup_logs(&self, worker: &str) -> Option<String> {
        if self.settings.remove_workers {
            return None;
        }
        self.workers.logs(worker, None).await.ok()
    }
}
