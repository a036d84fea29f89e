//! Worker control through the docker CLI.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use modelgen_core::{WorkerRecord, WorkerState};

use super::{WorkerControl, WorkerError, WorkerSpec};

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Names")]
    names: String,

    #[serde(rename = "State", default)]
    state: String,

    #[serde(rename = "Status", default)]
    status: String,
}

/// Output of `docker inspect --format '{{json .State}}'`.
#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status")]
    status: String,
}

/// Docker CLI backed worker control.
#[derive(Debug, Clone)]
pub struct DockerCli {
    /// Path to the docker executable.
    docker_path: String,
}

impl DockerCli {
    /// Create a new DockerCli.
    ///
    /// The path can be just "docker" to use PATH lookup, or a full path.
    pub fn new(docker_path: impl Into<String>) -> Self {
        Self {
            docker_path: docker_path.into(),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.docker_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run a docker command and return (stdout, stderr).
    async fn run(&self, args: Vec<String>) -> Result<(String, String), WorkerError> {
        debug!(docker = %self.docker_path, args = ?args, "Running docker command");

        let output = self.command(&args).output().await.map_err(|e| {
            error!(error = %e, "Failed to spawn docker");
            e
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok((stdout, stderr))
        } else {
            Err(command_failed(&args, stderr))
        }
    }
}

fn command_failed(args: &[String], stderr: String) -> WorkerError {
    let command = args.first().cloned().unwrap_or_default();
    let missing = stderr.contains("No such container") || stderr.contains("No such object");

    match (missing, args.last()) {
        (true, Some(name)) => WorkerError::NotFound(name.clone()),
        _ => WorkerError::CommandFailed {
            command,
            stderr: stderr.trim().to_string(),
        },
    }
}

fn parse_ps_output(stdout: &str, name: &str) -> Result<Vec<WorkerRecord>, WorkerError> {
    let mut records = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let entry: PsEntry =
            serde_json::from_str(line).map_err(|e| WorkerError::Parse(e.to_string()))?;

        // The name filter is a substring match; keep exact matches only.
        if !entry.names.split(',').any(|n| n.trim_start_matches('/') == name) {
            continue;
        }

        let state = if entry.state.is_empty() {
            state_from_status(&entry.status)
        } else {
            WorkerState::parse(&entry.state)
        };

        records.push(WorkerRecord::new(name, state).with_status(entry.status));
    }

    Ok(records)
}

/// Older docker versions only report a status text like "Up 5 minutes".
fn state_from_status(status: &str) -> WorkerState {
    if status.starts_with("Up") {
        WorkerState::Running
    } else if status.starts_with("Exited") {
        WorkerState::Exited
    } else {
        WorkerState::parse(status.split_whitespace().next().unwrap_or(""))
    }
}

fn run_args(spec: &WorkerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];

    if spec.auto_remove {
        args.push("--rm".to_string());
    }

    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }

    for volume in &spec.volumes {
        args.push("--volume".to_string());
        let mut mount = format!(
            "{}:{}",
            volume.host_path.display(),
            volume.container_path
        );
        if volume.read_only {
            mount.push_str(":ro");
        }
        args.push(mount);
    }

    args.push(spec.image.clone());
    args
}

/// Merge stdout and stderr of `docker logs`, keeping the last `tail` lines.
fn merge_logs(stdout: &str, stderr: &str, tail: Option<usize>) -> String {
    let combined = match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}{}", stdout, stderr),
    };

    match tail {
        Some(n) => {
            let lines: Vec<&str> = combined.lines().filter(|l| !l.trim().is_empty()).collect();
            let start = lines.len().saturating_sub(n);
            lines[start..].join("\n")
        }
        None => combined,
    }
}

#[async_trait]
impl WorkerControl for DockerCli {
    async fn list_workers(&self, name: &str, include_exited: bool) -> Result<Vec<WorkerRecord>, WorkerError> {
        let mut args = vec!["ps".to_string(), "--no-trunc".to_string()];
        if include_exited {
            args.push("--all".to_string());
        }
        args.extend([
            "--filter".to_string(),
            format!("name={}", name),
            "--format".to_string(),
            "{{json .}}".to_string(),
        ]);

        let (stdout, _) = self.run(args).await?;
        parse_ps_output(&stdout, name)
    }

    async fn logs(&self, name: &str, tail: Option<usize>) -> Result<String, WorkerError> {
        let mut args = vec!["logs".to_string()];
        if let Some(n) = tail {
            args.push("--tail".to_string());
            args.push(n.to_string());
        }
        args.push(name.to_string());

        let (stdout, stderr) = self.run(args).await?;
        Ok(merge_logs(&stdout, &stderr, tail))
    }

    async fn start_worker(&self, spec: &WorkerSpec) -> Result<WorkerRecord, WorkerError> {
        info!(
            worker = %spec.name,
            image = %spec.image,
            auto_remove = spec.auto_remove,
            "Starting worker"
        );

        let (stdout, _) = self.run(run_args(spec)).await?;
        debug!(worker = %spec.name, id = %stdout.trim(), "Worker started");

        self.inspect(&spec.name).await
    }

    async fn inspect(&self, name: &str) -> Result<WorkerRecord, WorkerError> {
        let args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
            "--format".to_string(),
            "{{json .State}}".to_string(),
            name.to_string(),
        ];

        let (stdout, _) = self.run(args).await?;
        let state: InspectState =
            serde_json::from_str(stdout.trim()).map_err(|e| WorkerError::Parse(e.to_string()))?;

        Ok(WorkerRecord::new(name, WorkerState::parse(&state.status)))
    }

    async fn login(&self, registry: &str, username: &str, password: &str) -> Result<(), WorkerError> {
        let args = vec![
            "login".to_string(),
            "--username".to_string(),
            username.to_string(),
            "--password-stdin".to_string(),
            registry.to_string(),
        ];

        let mut cmd = self.command(&args);
        cmd.stdin(Stdio::piped());
        let mut child = cmd.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(password.as_bytes()).await?;
            // Dropping stdin closes the pipe so docker reads EOF.
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            info!(registry = %registry, "Logged in to registry");
            Ok(())
        } else {
            Err(WorkerError::CommandFailed {
                command: "login".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use crate::worker::VolumeMount;

    #[test]
    fn test_parse_ps_output_exact_matches_only() {
        let stdout = concat!(
            r#"{"Names":"abc123","State":"running","Status":"Up 3 seconds"}"#,
            "\n",
            r#"{"Names":"abc123-old","State":"exited","Status":"Exited (0) 1 hour ago"}"#,
            "\n"
        );

        let records = parse_ps_output(stdout, "abc123").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, WorkerState::Running);
        assert_eq!(records[0].status, "Up 3 seconds");
    }

    #[test]
    fn test_parse_ps_output_without_state_field() {
        let stdout = r#"{"Names":"abc","Status":"Exited (1) 2 minutes ago"}"#;
        let records = parse_ps_output(stdout, "abc").unwrap();
        assert!(records[0].state.is_exited());
    }

    #[test]
    fn test_parse_ps_output_empty_and_invalid() {
        assert!(parse_ps_output("\n", "abc").unwrap().is_empty());
        assert!(matches!(
            parse_ps_output("not json", "abc"),
            Err(WorkerError::Parse(_))
        ));
    }

    #[test]
    fn test_run_args() {
        let spec = WorkerSpec {
            name: "abc".to_string(),
            image: "repo:5000/gen:v1".to_string(),
            env: BTreeMap::from([
                ("MODEL_NAME".to_string(), "model".to_string()),
                ("MODEL_TAG".to_string(), "v2".to_string()),
            ]),
            volumes: vec![VolumeMount {
                host_path: PathBuf::from("/etc/auth.json"),
                container_path: "/workspace/config.json".to_string(),
                read_only: true,
            }],
            auto_remove: true,
        };

        assert_eq!(
            run_args(&spec),
            vec![
                "run",
                "--detach",
                "--name",
                "abc",
                "--rm",
                "--env",
                "MODEL_NAME=model",
                "--env",
                "MODEL_TAG=v2",
                "--volume",
                "/etc/auth.json:/workspace/config.json:ro",
                "repo:5000/gen:v1",
            ]
        );
    }

    #[test]
    fn test_merge_logs_tail() {
        assert_eq!(merge_logs("a\nb\n", "c\n\n", Some(1)), "c");
        assert_eq!(merge_logs("a\nb\n", "", Some(2)), "a\nb");
        assert_eq!(merge_logs("a\n", "b\n", None), "a\nb\n");
    }

    #[test]
    fn test_command_failed_detects_missing_worker() {
        let args = vec!["inspect".to_string(), "abc".to_string()];
        let err = command_failed(&args, "Error: No such object: abc".to_string());
        assert!(matches!(err, WorkerError::NotFound(name) if name == "abc"));

        let err = command_failed(&args, "permission denied".to_string());
        assert!(matches!(err, WorkerError::CommandFailed { .. }));
    }

    #[test]
    fn test_state_from_status() {
        assert_eq!(state_from_status("Up 2 hours"), WorkerState::Running);
        assert_eq!(state_from_status("Created"), WorkerState::Created);
    }
}
