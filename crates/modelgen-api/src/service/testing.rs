//! In-memory collaborators for service tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use modelgen_core::{WorkerRecord, WorkerState};
use modelgen_repo_client::{
    ArtifactFile, ArtifactFileRef, Component, ContainerConfig, ImageConfig, ModelRepository,
    RepoError, SearchQuery,
};

use crate::worker::{WorkerControl, WorkerError, WorkerSpec};

/// Worker runtime fake. `inspect` pops states until one is left.
#[derive(Default)]
pub struct FakeWorkers {
    pub records: Vec<WorkerRecord>,
    pub logs: String,
    pub inspect_states: Mutex<VecDeque<WorkerState>>,
    pub started: Mutex<Vec<WorkerSpec>>,
    pub log_calls: AtomicUsize,
}

impl FakeWorkers {
    pub fn with_records(records: Vec<WorkerRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    pub fn with_inspect_states(self, states: Vec<WorkerState>) -> Self {
        *self.inspect_states.lock().unwrap() = states.into();
        self
    }

    fn next_state(&self) -> Option<WorkerState> {
        let mut states = self.inspect_states.lock().unwrap();
        if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        }
    }
}

#[async_trait]
impl WorkerControl for FakeWorkers {
    async fn list_workers(&self, name: &str, _include_exited: bool) -> Result<Vec<WorkerRecord>, WorkerError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    async fn logs(&self, _name: &str, tail: Option<usize>) -> Result<String, WorkerError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        match tail {
            Some(n) => {
                let lines: Vec<&str> = self.logs.lines().collect();
                Ok(lines[lines.len().saturating_sub(n)..].join("\n"))
            }
            None => Ok(self.logs.clone()),
        }
    }

    async fn start_worker(&self, spec: &WorkerSpec) -> Result<WorkerRecord, WorkerError> {
        self.started.lock().unwrap().push(spec.clone());
        self.inspect(&spec.name).await
    }

    async fn inspect(&self, name: &str) -> Result<WorkerRecord, WorkerError> {
        self.next_state()
            .map(|state| WorkerRecord::new(name, state))
            .ok_or_else(|| WorkerError::NotFound(name.to_string()))
    }

    async fn login(&self, _registry: &str, _username: &str, _password: &str) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Repository fake keyed by image name.
#[derive(Default)]
pub struct FakeRepository {
    /// Model image labels keyed by `<generator>/<tag>/<model>:<model_tag>`.
    pub model_labels: HashMap<String, HashMap<String, String>>,

    /// Generator image labels keyed by `<generator>:<tag>`.
    pub generator_labels: HashMap<String, HashMap<String, String>>,

    pub components: Vec<Component>,

    /// Artifact files keyed by path.
    pub files: HashMap<String, ArtifactFile>,

    /// Fail every model image lookup with this HTTP status.
    pub fail_status: Option<u16>,

    pub model_calls: AtomicUsize,
}

impl FakeRepository {
    pub fn with_model(mut self, image: &str, labels: &[(&str, &str)]) -> Self {
        self.model_labels.insert(image.to_string(), to_map(labels));
        self
    }

    pub fn with_generator(mut self, image: &str, labels: &[(&str, &str)]) -> Self {
        self.generator_labels.insert(image.to_string(), to_map(labels));
        self
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_file(mut self, path: &str, content_type: &str, body: &str) -> Self {
        self.files.insert(
            path.to_string(),
            ArtifactFile {
                content_type: Some(content_type.to_string()),
                bytes: body.as_bytes().to_vec(),
            },
        );
        self
    }
}

fn to_map(labels: &[(&str, &str)]) -> HashMap<String, String> {
    labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn image_config(labels: &HashMap<String, String>) -> ImageConfig {
    ImageConfig {
        created: None,
        config: Some(ContainerConfig {
            labels: Some(labels.clone()),
        }),
    }
}

#[async_trait]
impl ModelRepository for FakeRepository {
    async fn model_image(&self, g: &str, t: &str, m: &str, v: &str) -> Result<ImageConfig, RepoError> {
        self.model_calls.fetch_add(1, Ordering::SeqCst);
        let key = format!("{g}/{t}/{m}:{v}");

        if let Some(status) = self.fail_status {
            return Err(RepoError::Status { status, url: key });
        }

        self.model_labels
            .get(&key)
            .map(image_config)
            .ok_or(RepoError::NotFound(key))
    }

    async fn generator_image(&self, g: &str, t: &str) -> Result<ImageConfig, RepoError> {
        let key = format!("{g}:{t}");
        self.generator_labels
            .get(&key)
            .map(image_config)
            .ok_or(RepoError::NotFound(key))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Component>, RepoError> {
        Ok(self
            .components
            .iter()
            .filter(|c| query.repository.as_ref().map_or(true, |r| *r == c.repository))
            .filter(|c| query.format.as_ref().map_or(true, |f| *f == c.format))
            .cloned()
            .collect())
    }

    async fn artifact_file(&self, file: &ArtifactFileRef) -> Result<ArtifactFile, RepoError> {
        let path = file.path();
        self.files.get(&path).cloned().ok_or(RepoError::NotFound(path))
    }

    fn generator_repository(&self) -> &str {
        "model-generators"
    }
}

/// A search result component with the given asset file names.
pub fn component(repository: &str, format: &str, group: Option<&str>, name: &str, version: &str, assets: &[&str]) -> Component {
    Component {
        id: format!("{name}:{version}"),
        repository: repository.to_string(),
        format: format.to_string(),
        group: group.map(str::to_string),
        name: name.to_string(),
        version: version.to_string(),
        assets: assets
            .iter()
            .map(|path| modelgen_repo_client::Asset {
                path: path.to_string(),
                download_url: None,
                content_type: None,
            })
            .collect(),
    }
}
