//! Service configuration and registry credential files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use modelgen_repo_client::host_name;
use serde::Deserialize;
use thiserror::Error;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub bind_addr: String,

    /// Bearer token expected on `/v1` routes.
    pub password: String,

    /// Remove workers once they exit. Exited workers' logs are only
    /// available when this is off.
    pub remove_workers: bool,

    /// Verify TLS certificates of the repository and its registries.
    pub verify_tls: bool,

    /// Auth file mounted into workers so generators can push models.
    pub metagenerator_auth_config: PathBuf,

    /// `<host>:<port>` prefix of generator images.
    pub registry_prefix: Option<String>,

    /// Maximum wait for a new worker to reach the running state.
    pub startup_timeout: Duration,

    /// Interval between worker state polls during startup.
    pub poll_interval: Duration,

    /// Lines of worker output reported as progress.
    pub log_tail_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            password: "REFORMERS".to_string(),
            remove_workers: true,
            verify_tls: false,
            metagenerator_auth_config: PathBuf::from("/auth/metagenerator/config.json"),
            registry_prefix: None,
            startup_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_secs(1),
            log_tail_lines: 1,
        }
    }
}

/// Errors reading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed auth entry for {host}: {reason}")]
    MalformedEntry { host: String, reason: String },

    #[error("no credentials for {0}")]
    MissingCredentials(String),
}

/// Username and password pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Docker style auth file: `{"auths": {"<host>": {"auth": base64("user:pass")}}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigFile {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

impl AuthConfigFile {
    /// Load and parse an auth file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Credentials for `host`. Entries may be keyed by bare host or by URL.
    pub fn credentials(&self, host: &str) -> Result<Credentials, ConfigError> {
        let (key, entry) = self
            .auths
            .iter()
            .find(|(key, _)| host_name(key).as_deref() == Some(host))
            .ok_or_else(|| ConfigError::MissingCredentials(host.to_string()))?;
        decode_entry(key, entry)
    }

    /// All entries as `(registry, credentials)` pairs.
    pub fn entries(&self) -> Result<Vec<(String, Credentials)>, ConfigError> {
        self.auths
            .iter()
            .map(|(key, entry)| Ok((key.clone(), decode_entry(key, entry)?)))
            .collect()
    }
}

fn decode_entry(host: &str, entry: &AuthEntry) -> Result<Credentials, ConfigError> {
    let malformed = |reason: &str| ConfigError::MalformedEntry {
        host: host.to_string(),
        reason: reason.to_string(),
    };

    if let (Some(username), Some(password)) = (&entry.username, &entry.password) {
        return Ok(Credentials {
            username: username.clone(),
            password: password.clone(),
        });
    }

    let encoded = entry
        .auth
        .as_deref()
        .ok_or_else(|| malformed("no auth field"))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| malformed("auth is not base64"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed("auth is not UTF-8"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| malformed("auth is not user:password"))?;

    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}
