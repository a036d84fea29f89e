//! Artifact repository client for modelgen.
//!
//! Provides an HTTP client for the repository search API, the docker
//! registries hosted by the repository, and raw artifact downloads, plus the
//! [`ModelRepository`] trait the services are written against.

pub mod error;
pub mod http;
pub mod repository;
pub mod types;

pub use error::RepoError;
pub use http::{host_name, RepoClient, RepoConfig};
pub use repository::ModelRepository;
pub use types::{
    ArtifactFile, ArtifactFileRef, Asset, Component, ContainerConfig, DockerSettings, ImageConfig,
    RepositorySettings, SearchQuery,
};
