//! HTTP client for the repository REST API and its docker registries.

use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::RepoError;
use crate::types::{
    ArtifactFile, ArtifactFileRef, Component, ImageConfig, Manifest, RepositorySettings,
    SearchPage, SearchQuery,
};

const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

/// Host name of a URL or bare `host[:port]`, without scheme, credentials or port.
pub fn host_name(key: &str) -> Option<String> {
    reqwest::Url::parse(key)
        .ok()
        .filter(reqwest::Url::has_host)
        .or_else(|| reqwest::Url::parse(&format!("https://{}", key)).ok())
        .and_then(|url| url.host_str().map(str::to_string))
}

/// Connection settings for the repository.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Base URL, e.g. `https://repo.example.org`. A bare host gets `https://`.
    pub base_url: String,

    pub username: String,
    pub password: String,

    /// Verify TLS certificates of the repository.
    pub verify_tls: bool,

    /// Docker repository holding generator images.
    pub generator_repository: String,

    /// Docker repository holding model images.
    pub model_repository: String,

    /// Maven repository holding model artifacts.
    pub artifact_repository: String,
}

impl RepoConfig {
    /// Create a config with the default repository names.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.contains("://") {
            base_url
        } else {
            format!("https://{}", base_url)
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            verify_tls: true,
            generator_repository: "model-generators".to_string(),
            model_repository: "models".to_string(),
            artifact_repository: "model-artifacts".to_string(),
        }
    }

    /// Builder method to toggle TLS verification.
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }
}

/// Client for the artifact repository.
pub struct RepoClient {
    inner: reqwest::Client,
    config: RepoConfig,
}

impl RepoClient {
    /// Create a new repository client.
    pub fn new(config: RepoConfig) -> Result<Self, RepoError> {
        let inner = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Host name of the repository, without scheme or port.
    pub fn host(&self) -> Option<String> {
        host_name(&self.config.base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response, RepoError> {
        let response = request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(RepoError::NotFound(url.to_string())),
            status => Err(RepoError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, url: &str) -> Result<T, RepoError> {
        self.send(request, url)
            .await?
            .json()
            .await
            .map_err(|e| RepoError::Serialization(e.to_string()))
    }

    /// Fetch one page of search results.
    pub async fn search_page(
        &self,
        query: &SearchQuery,
        continuation_token: Option<&str>,
    ) -> Result<SearchPage, RepoError> {
        let url = self.url("/service/rest/v1/search");
        debug!(url = %url, query = ?query, "Searching components");

        let request = self.inner.get(&url).query(&query.params(continuation_token));
        self.get_json(request, &url).await
    }

    /// Search components, following continuation tokens until the last page.
    pub async fn search_all(&self, query: &SearchQuery) -> Result<Vec<Component>, RepoError> {
        let mut components = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .search_page(query, continuation_token.as_deref())
                .await?;
            components.extend(page.items);

            match page.continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(components)
    }

    /// List repository settings.
    pub async fn repository_settings(&self) -> Result<Vec<RepositorySettings>, RepoError> {
        let url = self.url("/service/rest/v1/repositorySettings");
        debug!(url = %url, "Fetching repository settings");
        self.get_json(self.inner.get(&url), &url).await
    }

    /// Fetch the config blob of an image in a docker repository.
    pub async fn image_config(
        &self,
        repository: &str,
        image: &str,
        reference: &str,
    ) -> Result<ImageConfig, RepoError> {
        let manifest_url = self.url(&format!(
            "/repository/{}/v2/{}/manifests/{}",
            repository, image, reference
        ));
        debug!(url = %manifest_url, "Fetching manifest");

        let request = self
            .inner
            .get(&manifest_url)
            .header(header::ACCEPT, MANIFEST_ACCEPT);
        let manifest: Manifest = self.get_json(request, &manifest_url).await?;

        let blob_url = self.url(&format!(
            "/repository/{}/v2/{}/blobs/{}",
            repository, image, manifest.config.digest
        ));
        debug!(url = %blob_url, "Fetching config blob");

        self.get_json(self.inner.get(&blob_url), &blob_url).await
    }

    /// Download a raw file from the artifact repository.
    pub async fn artifact_file(&self, file: &ArtifactFileRef) -> Result<ArtifactFile, RepoError> {
        let url = self.url(&format!(
            "/repository/{}/{}",
            self.config.artifact_repository,
            file.path()
        ));
        debug!(url = %url, "Downloading artifact file");

        let response = self.send(self.inner.get(&url), &url).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        Ok(ArtifactFile {
            content_type,
            bytes,
        })
    }
}
