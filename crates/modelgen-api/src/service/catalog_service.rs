//! Discovery of generators and generated models in the repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use modelgen_core::{decode_labels, validate_name, GeneratorInfo, ModelInfo};
use modelgen_repo_client::{ArtifactFileRef, Component, ModelRepository, SearchQuery};

use crate::error::TaskError;

/// Asset extensions that never denote the artifact itself.
const IGNORED_EXTENSIONS: &[&str] = &["pom", "md5", "sha1", "sha256", "sha512"];

/// Generator name to available tags.
pub type GeneratorList = BTreeMap<String, Vec<String>>;

/// Models of a generator, keyed by model name and version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelList {
    pub generator_name: String,
    pub generator_tag: String,
    pub models: BTreeMap<String, BTreeMap<String, ModelInfo>>,
}

/// Read-only view of generators and models in the repository.
pub struct CatalogService {
    repository: Arc<dyn ModelRepository>,
}

impl CatalogService {
    /// Create a new CatalogService.
    pub fn new(repository: Arc<dyn ModelRepository>) -> Self {
        Self { repository }
    }

    /// All generator images with their tags.
    pub async fn list_generators(&self) -> Result<GeneratorList, TaskError> {
        let query = SearchQuery::new().repository(self.repository.generator_repository());
        let components = self
            .repository
            .search(&query)
            .await
            .map_err(|e| TaskError::repository("searching generators", e))?;

        let mut generators = GeneratorList::new();
        for component in components {
            generators
                .entry(component.name)
                .or_default()
                .push(component.version);
        }
        Ok(generators)
    }

    /// Describe a generator from the labels of its image.
    pub async fn generator_info(&self, generator_name: &str, generator_tag: &str) -> Result<GeneratorInfo, TaskError> {
        validate_name("generator name", generator_name)?;
        validate_name("generator tag", generator_tag)?;

        let not_found = || TaskError::GeneratorNotFound {
            generator: generator_name.to_string(),
            tag: generator_tag.to_string(),
        };
        let invalid = || TaskError::InvalidGenerator {
            generator: generator_name.to_string(),
            tag: generator_tag.to_string(),
        };

        let image = match self
            .repository
            .generator_image(generator_name, generator_tag)
            .await
        {
            Ok(image) => image,
            Err(e) if e.is_not_found() => return Err(not_found()),
            Err(e) => {
                return Err(TaskError::repository(
                    format!("fetching generator {}:{}", generator_name, generator_tag),
                    e,
                ))
            }
        };

        let labels = image.labels().filter(|l| !l.is_empty()).ok_or_else(invalid)?;
        GeneratorInfo::from_labels(generator_name, generator_tag, &decode_labels(labels)).ok_or_else(invalid)
    }

    /// Models generated by a generator, as images and as plain artifacts.
    pub async fn list_models(&self, generator_name: &str, generator_tag: &str) -> Result<ModelList, TaskError> {
        validate_name("generator name", generator_name)?;
        validate_name("generator tag", generator_tag)?;

        let generators = self.list_generators().await?;
        let known = generators
            .get(generator_name)
            .is_some_and(|tags| tags.iter().any(|t| t == generator_tag));
        if !known {
            return Err(TaskError::GeneratorNotFound {
                generator: generator_name.to_string(),
                tag: generator_tag.to_string(),
            });
        }

        let mut models: BTreeMap<String, BTreeMap<String, ModelInfo>> = BTreeMap::new();
        let pattern = format!("*{}?{}*", generator_name, generator_tag);

        let images = self
            .repository
            .search(&SearchQuery::new().name(&pattern).format("docker"))
            .await
            .map_err(|e| TaskError::repository("searching model images", e))?;
        for component in images {
            if let Some((model, info)) = self.image_model(generator_name, generator_tag, &component).await? {
                models.entry(model).or_default().insert(component.version, info);
            }
        }

        let artifacts = self
            .repository
            .search(&SearchQuery::new().group(&pattern).format("maven2"))
            .await
            .map_err(|e| TaskError::repository("searching model artifacts", e))?;
        for component in artifacts {
            if let Some(info) = self.artifact_model(generator_name, generator_tag, &component).await {
                models
                    .entry(component.name)
                    .or_default()
                    .insert(component.version, info);
            }
        }

        Ok(ModelList {
            generator_name: generator_name.to_string(),
            generator_tag: generator_tag.to_string(),
            models,
        })
    }

    async fn image_model(
        &self,
        generator_name: &str,
        generator_tag: &str,
        component: &Component,
    ) -> Result<Option<(String, ModelInfo)>, TaskError> {
        let parts: Vec<&str> = component.name.split('/').collect();
        let model = match parts.as_slice() {
            // Build cache of the generator, not a model.
            [.., "cache"] => return Ok(None),
            [g, t, m] if *g == generator_name && *t == generator_tag => *m,
            _ => {
                debug!(image = %component.name, "Skipping image of another generator");
                return Ok(None);
            }
        };

        let version = component.version.as_str();
        let labels = self
            .repository
            .model_labels(generator_name, generator_tag, model, version)
            .await
            .map_err(|e| {
                TaskError::repository(format!("fetching labels of {}:{}", component.name, version), e)
            })?;

        let info = ModelInfo::from_image_labels(
            [generator_name, generator_tag, model, version],
            component.name.clone(),
            &decode_labels(labels),
        )?;
        Ok(Some((model.to_string(), info)))
    }

    async fn artifact_model(&self, generator_name: &str, generator_tag: &str, component: &Component) -> Option<ModelInfo> {
        let group = component.group.as_deref()?;
        if group != format!("{}.{}", generator_name, generator_tag) {
            debug!(group = %group, artifact = %component.name, "Skipping artifact of another generator");
            return None;
        }

        let file = ArtifactFileRef {
            generator_name: generator_name.to_string(),
            generator_tag: generator_tag.to_string(),
            model_name: component.name.clone(),
            model_version: component.version.clone(),
            file_name: format!("{}-{}-labels", component.name, component.version),
            extension: "json".to_string(),
        };

        let generation_parameters = match self.repository.artifact_file(&file).await {
            Ok(file) if file.content_type.as_deref().is_some_and(|ct| ct.starts_with("application/json")) => {
                match serde_json::from_slice::<Value>(&file.bytes) {
                    Ok(labels) => labels.get(generator_name).cloned(),
                    Err(e) => {
                        warn!(artifact = %component.name, error = %e, "Invalid labels file");
                        None
                    }
                }
            }
            Ok(file) => {
                warn!(
                    artifact = %component.name,
                    content_type = ?file.content_type,
                    "Unexpected content type of labels file"
                );
                None
            }
            Err(e) => {
                debug!(artifact = %component.name, error = %e, "No labels file");
                None
            }
        };

        Some(ModelInfo::artifact(
            component.name.clone(),
            component.version.clone(),
            group,
            artifact_type(component),
            generation_parameters,
        ))
    }
}

/// File extension of the main asset of an artifact.
///
/// Only `<name>-<version>.<ext>` assets count (no classifiers); POM and
/// checksum files are ignored. `None` unless exactly one extension is left.
pub fn artifact_type(component: &Component) -> Option<String> {
    let pattern = Regex::new(&format!(
        r"^{}-{}\.[a-zA-Z0-9.]+$",
        regex::escape(&component.name),
        regex::escape(&component.version)
    ))
    .ok()?;

    let types: Vec<&str> = component
        .assets
        .iter()
        .map(|asset| asset.file_name())
        .filter(|name| pattern.is_match(name))
        .filter_map(|name| name.rsplit('.').next())
        .filter(|ext| !IGNORED_EXTENSIONS.contains(ext))
        .collect();

    match types.as_slice() {
        [single] => Some(single.to_string()),
        _ => None,
    }
}
