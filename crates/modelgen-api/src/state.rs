//! Shared application state.

use std::sync::Arc;

use modelgen_repo_client::ModelRepository;

use crate::config::Config;
use crate::http::auth::hash_token;
use crate::service::{CatalogService, CreationService, CreationSettings, StatusService};
use crate::worker::WorkerControl;

/// Shared application state.
pub struct AppState {
    pub config: Config,

    /// SHA-256 of the expected bearer token (hex encoded).
    pub token_hash: String,

    pub status: StatusService,
    pub creation: CreationService,
    pub catalog: Arc<CatalogService>,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(
        config: Config,
        workers: Arc<dyn WorkerControl>,
        repository: Arc<dyn ModelRepository>,
    ) -> Arc<Self> {
        let catalog = Arc::new(CatalogService::new(repository.clone()));
        let status = StatusService::new(
            workers.clone(),
            repository,
            !config.remove_workers,
            config.log_tail_lines,
        );
        let creation = CreationService::new(workers, catalog.clone(), CreationSettings::from(&config));

        Arc::new(Self {
            token_hash: hash_token(&config.password),
            config,
            status,
            creation,
            catalog,
        })
    }
}
