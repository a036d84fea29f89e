//! modelgen API server

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use modelgen_api::config::{AuthConfigFile, Config};
use modelgen_api::{http, AppState, DockerCli, WorkerControl};
use modelgen_repo_client::{host_name, RepoClient, RepoConfig};

/// Model generation API server.
#[derive(Parser, Debug)]
#[command(name = "modelgen-api", about = "Model generation API server")]
struct Args {
    /// HTTP server address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: String,

    /// Artifact repository host, or its base URL
    #[arg(long, env = "HOST")]
    host: String,

    /// Auth file with credentials for the repository API
    #[arg(long, env = "REPO_AUTH_CONFIG", default_value = "/auth/repo/config.json")]
    repo_auth_config: PathBuf,

    /// Auth file with credentials for the image registries
    #[arg(long, env = "REGISTRY_AUTH_CONFIG", default_value = "/auth/registry/config.json")]
    registry_auth_config: PathBuf,

    /// Auth file mounted into generator workers
    #[arg(long, env = "METAGENERATOR_AUTH_CONFIG", default_value = "/auth/metagenerator/config.json")]
    metagenerator_auth_config: PathBuf,

    /// Remove workers after they exit
    #[arg(long, env = "REMOVE_CONTAINERS", default_value_t = true, action = clap::ArgAction::Set)]
    remove_workers: bool,

    /// Verify TLS certificates of the repository
    #[arg(long, env = "VERIFY_SSL", default_value_t = false, action = clap::ArgAction::Set)]
    verify_ssl: bool,

    /// Bearer token expected from API clients
    #[arg(long, env = "PASSWORD", default_value = "REFORMERS", hide_env_values = true)]
    password: String,

    /// Docker repository holding generator images
    #[arg(long, default_value = "model-generators")]
    generator_repository: String,

    /// Port of the generator registry (looked up in the repository if not set)
    #[arg(long)]
    registry_port: Option<u16>,

    /// Seconds to wait for a new worker to start
    #[arg(long, default_value = "20")]
    startup_timeout_secs: u64,

    /// Milliseconds between worker state polls during startup
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Lines of worker output reported as progress
    #[arg(long, default_value = "1")]
    log_tail_lines: usize,

    /// Path to the docker executable
    #[arg(long, default_value = "docker")]
    docker: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    // Repository client
    let repo_auth = AuthConfigFile::load(&args.repo_auth_config)?;
    let repo_host = host_name(&args.host)
        .ok_or_else(|| format!("invalid repository host '{}'", args.host))?;
    let credentials = repo_auth.credentials(&repo_host)?;

    let mut repo_config = RepoConfig::new(&args.host, credentials.username, credentials.password)
        .with_verify_tls(args.verify_ssl);
    repo_config.generator_repository = args.generator_repository.clone();
    let repository = Arc::new(RepoClient::new(repo_config)?);

    // Worker runtime, logged in to every registry of the auth file
    let workers = Arc::new(DockerCli::new(&args.docker));
    let registry_auth = AuthConfigFile::load(&args.registry_auth_config)?;
    for (registry, credentials) in registry_auth.entries()? {
        if let Err(e) = workers
            .login(&registry, &credentials.username, &credentials.password)
            .await
        {
            warn!(registry = %registry, error = %e, "Registry login failed");
        }
    }

    if !args.metagenerator_auth_config.is_file() {
        warn!(
            path = %args.metagenerator_auth_config.display(),
            "Metagenerator auth file not found - generators will not be able to push models"
        );
    }

    let registry_port = match args.registry_port {
        Some(port) => Some(port),
        None => lookup_registry_port(&repository, &args.generator_repository).await,
    };

    let config = Config {
        bind_addr: args.bind_addr,
        password: args.password,
        remove_workers: args.remove_workers,
        verify_tls: args.verify_ssl,
        metagenerator_auth_config: args.metagenerator_auth_config,
        registry_prefix: registry_port.map(|port| format!("{}:{}", repo_host, port)),
        startup_timeout: Duration::from_secs(args.startup_timeout_secs),
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        log_tail_lines: args.log_tail_lines,
    };

    info!(
        host = %args.host,
        registry = ?config.registry_prefix,
        remove_workers = config.remove_workers,
        verify_tls = config.verify_tls,
        "Starting modelgen API"
    );

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("HTTP server listening on {}", config.bind_addr);

    let state = AppState::new(config, workers, repository);
    if let Err(e) = axum::serve(listener, http::create_router(state)).await {
        error!(error = %e, "HTTP server error");
        return Err(e.into());
    }

    Ok(())
}

/// HTTP port of the docker connector of the generator repository.
async fn lookup_registry_port(repository: &RepoClient, name: &str) -> Option<u16> {
    let settings = match repository.repository_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Failed to read repository settings - model creation disabled");
            return None;
        }
    };

    let port = settings
        .into_iter()
        .find(|s| s.name == name)
        .filter(|s| s.format == "docker")
        .and_then(|s| s.docker)
        .and_then(|docker| docker.http_port);

    if port.is_none() {
        warn!(repository = %name, "Generator repository is not a docker registry - model creation disabled");
    }
    port
}
