//! HTTP request handlers.

mod generators;
mod health;
mod models;
mod tasks;

pub use generators::{get_generator, list_generators};
pub use health::{auth_info, health_check};
pub use models::{create_model, list_models};
pub use tasks::get_task;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::Config;
    use crate::service::testing::{FakeRepository, FakeWorkers};
    use crate::state::AppState;

    pub fn test_state(workers: FakeWorkers, repository: FakeRepository) -> Arc<AppState> {
        let config = Config {
            registry_prefix: Some("repo.example.org:5000".to_string()),
            startup_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
            ..Config::default()
        };
        AppState::new(config, Arc::new(workers), Arc::new(repository))
    }
}
