//! Generator and model description types.
//!
//! Both are read from image labels. A generator image carries
//! `<generator>.<tag>.{config,parameters,build}.*` labels; a model image
//! carries `<generator>.<tag>.<model>.<model-tag>.*` labels written by the
//! generator that produced it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::labels::{extract, LabelTree};
use crate::CoreError;

/// Information about a model generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    pub generator_name: String,
    pub generator_tag: String,

    /// Fixed configuration of the generator.
    pub config: LabelTree,

    /// Parameters a caller may set when creating a model.
    pub parameters: LabelTree,

    /// Build metadata of the generator image.
    pub build: LabelTree,
}

impl GeneratorInfo {
    /// Read generator info from the decoded labels of the generator image.
    ///
    /// Returns `None` if the labels do not describe this generator.
    pub fn from_labels(generator_name: &str, generator_tag: &str, labels: &LabelTree) -> Option<Self> {
        let info = match labels.get(generator_name)? {
            Value::Object(tags) => match tags.get(generator_tag)? {
                Value::Object(info) => info,
                _ => return None,
            },
            _ => return None,
        };

        let section = |name: &str| match info.get(name) {
            Some(Value::Object(map)) => map.clone(),
            _ => LabelTree::new(),
        };

        Some(Self {
            generator_name: generator_name.to_string(),
            generator_tag: generator_tag.to_string(),
            config: section("config"),
            parameters: section("parameters"),
            build: section("build"),
        })
    }

    /// Check whether a caller-supplied parameter is known to this generator.
    pub fn accepts_parameter(&self, name: &str) -> bool {
        self.config.contains_key(name) || self.parameters.contains_key(name)
    }
}

/// Information about a generated model, either a container image or a
/// plain repository artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Runtime arguments the model accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<LabelTree>,

    /// Optional runtime arguments the model accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional_parameters: Option<LabelTree>,

    /// Free-form model metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,

    /// Parameters the model was generated with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_parameters: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_group_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    /// Repository format the model was found in (`docker`, `maven2`).
    pub format: String,
}

impl ModelInfo {
    /// Describe a model image from its decoded labels.
    ///
    /// `parameters` (with its `optional` subtree) and `info` are split off;
    /// everything else under the model path is a generation parameter.
    pub fn from_image_labels(
        path: [&str; 4],
        image_name: impl Into<String>,
        labels: &LabelTree,
    ) -> Result<Self, CoreError> {
        let mut generation_parameters = extract(labels, &path)?;

        let mut parameters = match generation_parameters.remove("parameters") {
            Some(Value::Object(map)) => map,
            _ => LabelTree::new(),
        };
        let optional_parameters = match parameters.remove("optional") {
            Some(Value::Object(map)) => map,
            _ => LabelTree::new(),
        };
        let info = generation_parameters.remove("info");

        Ok(Self {
            parameters: Some(parameters),
            optional_parameters: Some(optional_parameters),
            info,
            generation_parameters: Some(Value::Object(generation_parameters)),
            image_name: Some(image_name.into()),
            image_tag: Some(path[3].to_string()),
            format: "docker".to_string(),
            ..Default::default()
        })
    }

    /// Describe a plain repository artifact.
    pub fn artifact(
        artifact_id: impl Into<String>,
        artifact_version: impl Into<String>,
        artifact_group_id: impl Into<String>,
        artifact_type: Option<String>,
        generation_parameters: Option<Value>,
    ) -> Self {
        Self {
            artifact_id: Some(artifact_id.into()),
            artifact_version: Some(artifact_version.into()),
            artifact_group_id: Some(artifact_group_id.into()),
            artifact_type,
            generation_parameters,
            format: "maven2".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::decode_labels;
    use serde_json::json;

    #[test]
    fn test_generator_info_from_labels() {
        let labels = decode_labels([
            ("gen.v1.config.BASE_IMAGE", "python:3.11"),
            ("gen.v1.parameters.EPOCHS", "number of epochs"),
            ("gen.v1.build.DATE", "2024-01-01"),
            ("other.v1.config.X", "x"),
        ]);

        let info = GeneratorInfo::from_labels("gen", "v1", &labels).unwrap();
        assert_eq!(info.config.get("BASE_IMAGE"), Some(&json!("python:3.11")));
        assert!(info.accepts_parameter("EPOCHS"));
        assert!(info.accepts_parameter("BASE_IMAGE"));
        assert!(!info.accepts_parameter("UNKNOWN"));
    }

    #[test]
    fn test_generator_info_missing_labels() {
        let labels = decode_labels([("other.v1.config.X", "x")]);
        assert!(GeneratorInfo::from_labels("gen", "v1", &labels).is_none());
        assert!(GeneratorInfo::from_labels("other", "v2", &labels).is_none());
    }

    #[test]
    fn test_model_info_from_image_labels() {
        let labels = decode_labels([
            ("gen.v1.model.m1.CREATED", "2024-01-01T00:00:00+00:00"),
            ("gen.v1.model.m1.EPOCHS", "10"),
            ("gen.v1.model.m1.parameters.INPUT", "input file"),
            ("gen.v1.model.m1.parameters.optional.SEED", "random seed"),
            ("gen.v1.model.m1.info.description", "a test model"),
        ]);

        let info = ModelInfo::from_image_labels(["gen", "v1", "model", "m1"], "gen/v1/model", &labels)
            .unwrap();

        assert_eq!(
            info.generation_parameters,
            Some(json!({"CREATED": "2024-01-01T00:00:00+00:00", "EPOCHS": "10"}))
        );
        assert_eq!(
            info.parameters.map(Value::Object),
            Some(json!({"INPUT": "input file"}))
        );
        assert_eq!(
            info.optional_parameters.map(Value::Object),
            Some(json!({"SEED": "random seed"}))
        );
        assert_eq!(info.info, Some(json!({"description": "a test model"})));
        assert_eq!(info.image_tag.as_deref(), Some("m1"));
        assert_eq!(info.format, "docker");
    }

    #[test]
    fn test_model_info_serialization_skips_empty_fields() {
        let info = ModelInfo::artifact("model", "1.0", "gen.v1", Some("zip".to_string()), None);
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(
            value,
            json!({
                "artifact_id": "model",
                "artifact_version": "1.0",
                "artifact_group_id": "gen.v1",
                "artifact_type": "zip",
                "format": "maven2"
            })
        );
    }
}
