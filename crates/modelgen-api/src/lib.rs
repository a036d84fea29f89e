//! modelgen API Library
//!
//! This crate provides the model generation HTTP API: generator and model
//! discovery in the artifact repository, starting generator workers, and
//! stateless task status reconciliation.

pub mod config;
pub mod error;
pub mod http;
pub mod service;
pub mod state;
pub mod worker;

pub use config::Config;
pub use error::{ApiError, TaskError};
pub use service::{CatalogService, CreationService, StatusService};
pub use state::AppState;
pub use worker::{DockerCli, WorkerControl};
