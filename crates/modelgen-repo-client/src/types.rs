//! Wire types of the repository REST API and the docker registry API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Search types
// ============================================================================

/// Filter for a component search. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub repository: Option<String>,
    pub format: Option<String>,
    pub group: Option<String>,
    pub name: Option<String>,
}

impl SearchQuery {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Query string parameters, including the continuation token if any.
    pub fn params(&self, continuation_token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let fields = [
            ("repository", &self.repository),
            ("format", &self.format),
            ("group", &self.group),
            ("name", &self.name),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                params.push((key, value.clone()));
            }
        }
        if let Some(token) = continuation_token {
            params.push(("continuationToken", token.to_string()));
        }
        params
    }
}

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<Component>,

    /// Token for the next page, `None` on the last page.
    pub continuation_token: Option<String>,
}

/// A component (docker image or maven artifact) found by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub format: String,
    pub group: Option<String>,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A single file belonging to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub path: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Asset {
    /// File name part of the asset path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

// ============================================================================
// Repository settings
// ============================================================================

/// Settings of a hosted repository.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySettings {
    pub name: String,
    pub format: String,
    #[serde(default)]
    pub docker: Option<DockerSettings>,
}

/// Docker connector settings of a repository.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerSettings {
    pub http_port: Option<u16>,
    pub https_port: Option<u16>,
}

// ============================================================================
// Registry types
// ============================================================================

/// Image manifest; only the config descriptor is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub config: Descriptor,
}

/// Content descriptor inside a manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub digest: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

/// Image config blob.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageConfig {
    /// Image creation time as written by the builder.
    pub created: Option<String>,

    pub config: Option<ContainerConfig>,
}

/// Container configuration inside an image config blob.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerConfig {
    #[serde(rename = "Labels", default)]
    pub labels: Option<HashMap<String, String>>,
}

impl ImageConfig {
    /// Flat image labels; `None` if the blob has no container config.
    pub fn labels(&self) -> Option<HashMap<String, String>> {
        self.config
            .as_ref()
            .map(|config| config.labels.clone().unwrap_or_default())
    }
}

// ============================================================================
// Artifact files
// ============================================================================

/// Location of a raw file stored next to a maven artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFileRef {
    pub generator_name: String,
    pub generator_tag: String,
    pub model_name: String,
    pub model_version: String,
    pub file_name: String,
    pub extension: String,
}

impl ArtifactFileRef {
    /// Path of the file inside the artifact repository.
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}.{}",
            self.generator_name,
            self.generator_tag,
            self.model_name,
            self.model_version,
            self.file_name,
            self.extension
        )
    }
}

/// A downloaded artifact file.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_query_params() {
        let query = SearchQuery::new().name("*gen?v1*").format("docker");
        assert_eq!(
            query.params(Some("abc")),
            vec![
                ("format", "docker".to_string()),
                ("name", "*gen?v1*".to_string()),
                ("continuationToken", "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_search_page() {
        let page: SearchPage = serde_json::from_value(json!({
            "items": [{
                "id": "x",
                "repository": "models",
                "format": "maven2",
                "group": "gen.v1",
                "name": "model",
                "version": "1.0",
                "assets": [{"path": "gen/v1/model/1.0/model-1.0.zip", "downloadUrl": "https://r/x"}]
            }],
            "continuationToken": null
        }))
        .unwrap();

        assert!(page.continuation_token.is_none());
        assert_eq!(page.items[0].group.as_deref(), Some("gen.v1"));
        assert_eq!(page.items[0].assets[0].file_name(), "model-1.0.zip");
    }

    #[test]
    fn test_image_config_labels() {
        let blob: ImageConfig = serde_json::from_value(json!({
            "created": "2024-01-01T00:00:00.123456Z",
            "config": {"Labels": {"gen.v1.m.v.CREATED": "2024-01-01T00:00:00+00:00"}}
        }))
        .unwrap();
        assert_eq!(blob.labels().unwrap().len(), 1);

        let no_labels: ImageConfig = serde_json::from_value(json!({"config": {}})).unwrap();
        assert_eq!(no_labels.labels(), Some(HashMap::new()));

        let no_config: ImageConfig = serde_json::from_value(json!({})).unwrap();
        assert!(no_config.labels().is_none());
    }

    #[test]
    fn test_artifact_file_path() {
        let file = ArtifactFileRef {
            generator_name: "gen".to_string(),
            generator_tag: "v1".to_string(),
            model_name: "model".to_string(),
            model_version: "1.0".to_string(),
            file_name: "model-1.0-labels".to_string(),
            extension: "json".to_string(),
        };
        assert_eq!(file.path(), "gen/v1/model/1.0/model-1.0-labels.json");
    }
}
