//! Worker process records and log sanitizing.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::WorkerState;

/// A worker process as seen by the worker runtime.
///
/// Owned by the runtime; modelgen only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Runtime name of the process (derived from the task, see [`crate::worker_name`]).
    pub name: String,

    /// Lifecycle state.
    pub state: WorkerState,

    /// Human readable status reported by the runtime (e.g. "Up 5 seconds").
    pub status: String,
}

impl WorkerRecord {
    /// Create a new WorkerRecord.
    pub fn new(name: impl Into<String>, state: WorkerState) -> Self {
        Self {
            name: name.into(),
            status: state.to_string(),
            state,
        }
    }

    /// Builder method to set the runtime status text.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

fn escape_sequences() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // CSI sequences, OSC sequences (BEL or ST terminated), then
        // two-character escapes.
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-_]")
            .expect("static regex is valid")
    })
}

/// Strip terminal formatting from worker output.
///
/// Removes ANSI escape sequences, keeps only what a terminal would show
/// after carriage returns, drops remaining control characters and trims
/// spaces, dashes, tabs and newlines from both ends.
pub fn sanitize_output(raw: &str) -> String {
    let stripped = escape_sequences().replace_all(raw, "");

    let visible: Vec<&str> = stripped
        .split('\n')
        .map(|line| line.rsplit('\r').find(|s| !s.is_empty()).unwrap_or(""))
        .collect();

    visible
        .join("\n")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim_matches(|c| matches!(c, ' ' | '-' | '\n' | '\t'))
        .to_string()
}

/// Info text for a task whose worker is still alive.
pub fn progress_info(state: &WorkerState, raw_tail: &str) -> String {
    format!(
        "generator is {}, progress: {}",
        state,
        sanitize_output(raw_tail)
    )
}
