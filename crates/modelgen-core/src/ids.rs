//! Task handles and worker names.
//!
//! A task handle is the only durable record of a generation task. It is the
//! standard Base64 encoding of `<generator>:<tag>:<created-at epoch seconds>`
//! and is never stored server-side. Handles issued by earlier deployments
//! must keep decoding, so the plain format is frozen.

use std::fmt;
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]+$").expect("static regex is valid"))
}

/// Check a generator or model name/tag against the naming rules.
///
/// Names are lowercase alphanumerics and hyphens, at least two characters
/// long, and must not start with a hyphen.
pub fn validate_name(field: &'static str, value: &str) -> Result<(), CoreError> {
    if name_pattern().is_match(value) {
        Ok(())
    } else {
        Err(CoreError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

/// Render a timestamp in canonical form.
///
/// RFC 3339 with a `+00:00` offset; microseconds are shown only when
/// non-zero. This string feeds the worker name hash and the `CREATED`
/// environment of a worker, so it must stay stable.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    let format = if ts.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    ts.to_rfc3339_opts(format, false)
}

/// Epoch seconds with microsecond resolution, formatted like a float repr.
fn epoch_seconds(ts: &DateTime<Utc>) -> String {
    // i64 -> f64 is exact below 2^53 and the division rounds once.
    let secs = ts.timestamp_micros() as f64 / 1_000_000.0;
    let mut text = secs.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

fn parse_epoch_seconds(text: &str) -> Result<DateTime<Utc>, CoreError> {
    let secs: f64 = text
        .parse()
        .map_err(|_| CoreError::MalformedIdentifier(format!("invalid timestamp '{}'", text)))?;

    if !secs.is_finite() || secs.abs() >= 9.0e12 {
        return Err(CoreError::MalformedIdentifier(format!(
            "timestamp out of range '{}'",
            text
        )));
    }

    let micros = (secs * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| CoreError::MalformedIdentifier(format!("timestamp out of range '{}'", text)))
}

/// The decoded content of a task handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    /// Generator name (the subject producing the model).
    pub generator_name: String,

    /// Generator tag.
    pub generator_tag: String,

    /// When the task was submitted, truncated to microseconds.
    pub created_at: DateTime<Utc>,
}

impl TaskKey {
    /// Create a validated TaskKey.
    pub fn new(
        generator_name: impl Into<String>,
        generator_tag: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let generator_name = generator_name.into();
        let generator_tag = generator_tag.into();
        validate_name("generator name", &generator_name)?;
        validate_name("generator tag", &generator_tag)?;

        Ok(Self {
            generator_name,
            generator_tag,
            created_at: created_at.trunc_subsecs(6),
        })
    }

    /// Create a TaskKey stamped with the current time.
    pub fn now(
        generator_name: impl Into<String>,
        generator_tag: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Self::new(generator_name, generator_tag, Utc::now())
    }

    /// Encode this key into an opaque task handle.
    pub fn handle(&self) -> TaskHandle {
        let plain = format!(
            "{}:{}:{}",
            self.generator_name,
            self.generator_tag,
            epoch_seconds(&self.created_at)
        );
        TaskHandle(STANDARD.encode(plain.as_bytes()))
    }

    /// Name of the worker process executing this task.
    pub fn worker_name(&self) -> String {
        worker_name(&self.generator_name, &self.generator_tag, &self.created_at)
    }
}

/// Derive the worker process name for a task.
///
/// SHA-256 over name, tag and the canonical timestamp, hex encoded. Retries
/// of the same task map to the same worker; distinct tasks do not collide.
pub fn worker_name(generator_name: &str, generator_tag: &str, created_at: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generator_name.as_bytes());
    hasher.update(generator_tag.as_bytes());
    hasher.update(canonical_timestamp(created_at).as_bytes());
    hex::encode(hasher.finalize())
}

/// Opaque identifier of a generation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    /// Create a new TaskHandle from a string without decoding it.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate the parts and encode them into a handle.
    pub fn encode(
        generator_name: &str,
        generator_tag: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        Ok(TaskKey::new(generator_name, generator_tag, created_at)?.handle())
    }

    /// Decode the handle back into its parts.
    pub fn decode(&self) -> Result<TaskKey, CoreError> {
        let bytes = STANDARD
            .decode(self.0.as_bytes())
            .map_err(|e| CoreError::MalformedIdentifier(e.to_string()))?;
        let plain = String::from_utf8(bytes)
            .map_err(|_| CoreError::MalformedIdentifier("not valid UTF-8".to_string()))?;

        let fields: Vec<&str> = plain.split(':').collect();
        let [generator_name, generator_tag, created_at] = fields.as_slice() else {
            return Err(CoreError::MalformedIdentifier(format!(
                "expected 3 fields, found {}",
                fields.len()
            )));
        };

        Ok(TaskKey {
            generator_name: (*generator_name).to_string(),
            generator_tag: (*generator_tag).to_string(),
            created_at: parse_epoch_seconds(created_at)?,
        })
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskHandle {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64, micros: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, micros * 1_000).unwrap()
    }

    #[test]
    fn test_handle_round_trip() {
        for created_at in [
            ts(1_700_000_000, 123_456),
            ts(1_700_000_000, 0),
            ts(1_700_000_000, 1),
            ts(1_700_000_000, 999_999),
            ts(0, 500_000),
        ] {
            let handle = TaskHandle::encode("my-gen", "v1", created_at).unwrap();
            let key = handle.decode().unwrap();
            assert_eq!(key.generator_name, "my-gen");
            assert_eq!(key.generator_tag, "v1");
            assert_eq!(key.created_at, created_at);
        }
    }

    #[test]
    fn test_handle_truncates_below_microseconds() {
        let created_at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let key = TaskHandle::encode("gen", "v1", created_at)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(key.created_at, ts(1_700_000_000, 123_456));
    }

    #[test]
    fn test_handle_plain_format() {
        let handle = TaskHandle::encode("my-gen", "v1", ts(1_700_000_000, 123_456)).unwrap();
        assert_eq!(handle.as_str(), "bXktZ2VuOnYxOjE3MDAwMDAwMDAuMTIzNDU2");

        let handle = TaskHandle::encode("my-gen", "v1", ts(1_700_000_000, 0)).unwrap();
        assert_eq!(handle.as_str(), "bXktZ2VuOnYxOjE3MDAwMDAwMDAuMA==");
    }

    #[test]
    fn test_decode_previously_issued_handle() {
        let key = TaskHandle::new("YTpiOjEuMA==").decode().unwrap();
        assert_eq!(key.generator_name, "a");
        assert_eq!(key.generator_tag, "b");
        assert_eq!(key.created_at, ts(1, 0));
    }

    #[test]
    fn test_encode_rejects_invalid_names() {
        for name in ["A", "ab_c", "x", "-ab", "Gen", "a b", ""] {
            let result = TaskHandle::encode(name, "v1", Utc::now());
            assert!(
                matches!(result, Err(CoreError::InvalidIdentifier { .. })),
                "{name} should be rejected"
            );
            let result = TaskHandle::encode("gen", name, Utc::now());
            assert!(matches!(result, Err(CoreError::InvalidIdentifier { .. })));
        }
    }

    #[test]
    fn test_validate_name_accepts_valid_names() {
        for name in ["ab", "a-", "0a", "my-model-2", "v1-0-3"] {
            assert!(validate_name("model name", name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_decode_malformed_handles() {
        for raw in [
            "not-base64-!!",
            "Z2VuOnYx",             // gen:v1
            "Z2VuOnYxOmFiYzoxLjA=", // gen:v1:abc:1.0
            "Z2VuOnYxOm5hbg==",     // gen:v1:nan
            "Z2VuOnYxOmluZg==",     // gen:v1:inf
            "Z2VuOnYxOjFlMjA=",     // gen:v1:1e20
            "//46eA==",             // invalid utf-8
            "",
        ] {
            let result = TaskHandle::new(raw).decode();
            assert!(
                matches!(result, Err(CoreError::MalformedIdentifier(_))),
                "{raw} should be malformed"
            );
        }
    }

    #[test]
    fn test_worker_name_is_deterministic() {
        let created_at = ts(1_700_000_000, 123_456);
        let a = worker_name("gen", "v1", &created_at);
        let b = worker_name("gen", "v1", &created_at);
        let c = worker_name("gen", "v1", &ts(1_700_000_000, 123_457));
        let d = worker_name("gen", "v2", &created_at);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_worker_name_survives_handle_round_trip() {
        let key = TaskKey::new("gen", "v1", ts(1_700_000_000, 42)).unwrap();
        let decoded = key.handle().decode().unwrap();
        assert_eq!(key.worker_name(), decoded.worker_name());
    }

    #[test]
    fn test_canonical_timestamp() {
        assert_eq!(
            canonical_timestamp(&ts(1_700_000_000, 123_456)),
            "2023-11-14T22:13:20.123456+00:00"
        );
        assert_eq!(
            canonical_timestamp(&ts(1_700_000_000, 0)),
            "2023-11-14T22:13:20+00:00"
        );
    }
}
