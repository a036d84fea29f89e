//! The repository operations modelgen services depend on.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::RepoError;
use crate::http::RepoClient;
use crate::types::{ArtifactFile, ArtifactFileRef, Component, ImageConfig, SearchQuery};

/// Read-only access to generator images, model images and model artifacts.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Config blob of the model image `<generator>/<tag>/<model>:<model_tag>`.
    ///
    /// Fails with [`RepoError::NotFound`] when no such image is published.
    async fn model_image(
        &self,
        generator_name: &str,
        generator_tag: &str,
        model_name: &str,
        model_tag: &str,
    ) -> Result<ImageConfig, RepoError>;

    /// Config blob of the generator image `<generator>:<tag>`.
    async fn generator_image(
        &self,
        generator_name: &str,
        generator_tag: &str,
    ) -> Result<ImageConfig, RepoError>;

    /// All components matching the query, across every result page.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Component>, RepoError>;

    /// A raw file stored next to a model artifact.
    async fn artifact_file(&self, file: &ArtifactFileRef) -> Result<ArtifactFile, RepoError>;

    /// Name of the docker repository holding generator images.
    fn generator_repository(&self) -> &str;

    /// Flat labels of a model image.
    async fn model_labels(
        &self,
        generator_name: &str,
        generator_tag: &str,
        model_name: &str,
        model_tag: &str,
    ) -> Result<HashMap<String, String>, RepoError> {
        let image = self
            .model_image(generator_name, generator_tag, model_name, model_tag)
            .await?;

        image.labels().ok_or_else(|| {
            RepoError::InvalidResponse(format!(
                "no model image config found for {}/{}/{}:{}",
                generator_name, generator_tag, model_name, model_tag
            ))
        })
    }
}

#[async_trait]
impl ModelRepository for RepoClient {
    async fn model_image(
        &self,
        generator_name: &str,
        generator_tag: &str,
        model_name: &str,
        model_tag: &str,
    ) -> Result<ImageConfig, RepoError> {
        let image = format!("{}/{}/{}", generator_name, generator_tag, model_name);
        debug!(image = %image, tag = %model_tag, "Fetching model image");
        self.image_config(&self.config().model_repository, &image, model_tag)
            .await
    }

    async fn generator_image(
        &self,
        generator_name: &str,
        generator_tag: &str,
    ) -> Result<ImageConfig, RepoError> {
        debug!(generator = %generator_name, tag = %generator_tag, "Fetching generator image");
        self.image_config(
            &self.config().generator_repository,
            generator_name,
            generator_tag,
        )
        .await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Component>, RepoError> {
        self.search_all(query).await
    }

    async fn artifact_file(&self, file: &ArtifactFileRef) -> Result<ArtifactFile, RepoError> {
        RepoClient::artifact_file(self, file).await
    }

    fn generator_repository(&self) -> &str {
        &self.config().generator_repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerConfig;

    struct FixedImage(Option<ImageConfig>);

    #[async_trait]
    impl ModelRepository for FixedImage {
        async fn model_image(&self, g: &str, t: &str, m: &str, v: &str) -> Result<ImageConfig, RepoError> {
            self.0
                .clone()
                .ok_or_else(|| RepoError::NotFound(format!("{g}/{t}/{m}:{v}")))
        }

        async fn generator_image(&self, g: &str, t: &str) -> Result<ImageConfig, RepoError> {
            Err(RepoError::NotFound(format!("{g}:{t}")))
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<Component>, RepoError> {
            Ok(Vec::new())
        }

        async fn artifact_file(&self, file: &ArtifactFileRef) -> Result<ArtifactFile, RepoError> {
            Err(RepoError::NotFound(file.path()))
        }

        fn generator_repository(&self) -> &str {
            "model-generators"
        }
    }

    #[tokio::test]
    async fn test_model_labels_from_image() {
        let labels = HashMap::from([("gen.v1.m.v.CREATED".to_string(), "x".to_string())]);
        let repo = FixedImage(Some(ImageConfig {
            created: None,
            config: Some(ContainerConfig {
                labels: Some(labels.clone()),
            }),
        }));

        assert_eq!(repo.model_labels("gen", "v1", "m", "v").await.unwrap(), labels);
    }

    #[tokio::test]
    async fn test_model_labels_not_found() {
        let repo = FixedImage(None);
        let err = repo.model_labels("gen", "v1", "m", "v").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_model_labels_without_config() {
        let repo = FixedImage(Some(ImageConfig::default()));
        let err = repo.model_labels("gen", "v1", "m", "v").await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidResponse(_)));
    }
}
