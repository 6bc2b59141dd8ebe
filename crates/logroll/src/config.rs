//! Sink configuration.
//!
//! [`SinkConfig`] is the resolved configuration surface of a rotating sink.
//! It can be built in code with the `with_*` methods or deserialized from
//! JSON; [`SinkConfig::trigger_policy`] and [`SinkConfig::retention_policy`]
//! turn it into the policies the sink runs with.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SinkError};
use crate::retention::RetentionPolicy;
use crate::trigger::TriggerPolicy;

/// Default backup name pattern. Informational only; backups are always
/// named and parsed with the fixed `YYYYMMDD[_HHMMSS][_mmm]` format.
pub const DEFAULT_NAME_PATTERN: &str = ".yyyyMMdd.hhmmss.ms";

/// Retain count used when rotation is enabled without an explicit count.
pub const DEFAULT_RETAIN_COUNT: usize = 1;

/// Configuration for a rotating file sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Path of the active log file.
    #[serde(default)]
    pub path: PathBuf,
    /// Maximum size of the active file in bytes. Zero disables rotation.
    #[serde(default, deserialize_with = "deserialize_byte_size")]
    pub max_size: u64,
    /// Number of backups to keep. Zero selects the default.
    #[serde(default, deserialize_with = "deserialize_retain_count")]
    pub retain_count: usize,
    /// Backup name pattern.
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,
}

fn default_name_pattern() -> String {
    DEFAULT_NAME_PATTERN.to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            max_size: 0,
            retain_count: 0,
            name_pattern: default_name_pattern(),
        }
    }
}

impl SinkConfig {
    /// Creates a config for the given file with rotation disabled.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the maximum file size before rotation (0 disables rotation).
    #[must_use]
    pub const fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Sets the number of backups to retain.
    #[must_use]
    pub const fn with_retain_count(mut self, count: usize) -> Self {
        self.retain_count = count;
        self
    }

    /// Sets the backup name pattern.
    #[must_use]
    pub fn with_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = pattern.into();
        self
    }

    /// Parses a config from a JSON document.
    ///
    /// Every field is optional so that a document can be completed by other
    /// sources; [`SinkConfig::validate`] (also run when a sink opens) rejects
    /// a config that still has no path.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Configuration`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SinkError::Configuration(format!("invalid sink config: {e}")))
    }

    /// Checks that the config can be used to open a sink.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Configuration`] if no file path is set.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(SinkError::Configuration(
                "sink requires a path to the log file".to_string(),
            ));
        }
        if self.path.file_name().is_none() {
            return Err(SinkError::Configuration(format!(
                "sink path {} does not name a file",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Returns true if size-triggered rotation is enabled.
    #[must_use]
    pub const fn rotation_enabled(&self) -> bool {
        self.max_size > 0
    }

    /// Resolves the trigger policy.
    #[must_use]
    pub const fn trigger_policy(&self) -> TriggerPolicy {
        if self.max_size > 0 {
            TriggerPolicy::Size {
                max_bytes: self.max_size,
            }
        } else {
            TriggerPolicy::Never
        }
    }

    /// Resolves the retention policy.
    ///
    /// An unset count becomes [`DEFAULT_RETAIN_COUNT`] when rotation is
    /// enabled and unbounded retention otherwise.
    #[must_use]
    pub const fn retention_policy(&self) -> RetentionPolicy {
        match (self.retain_count, self.rotation_enabled()) {
            (0, true) => RetentionPolicy::Count(DEFAULT_RETAIN_COUNT),
            (0, false) => RetentionPolicy::Unbounded,
            (n, _) => RetentionPolicy::Count(n),
        }
    }
}

/// Parses a byte size such as `1048576`, `512K`, `10MB` or `1g`.
///
/// Suffixes are binary multiples (K = 1024).
///
/// # Errors
///
/// Returns [`SinkError::Configuration`] for malformed or overflowing sizes.
pub fn parse_byte_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let invalid = || SinkError::Configuration(format!("invalid byte size: {input:?}"));

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let multiplier: u64 = match suffix.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };

    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// Converts a signed retain count from user input. Values at or below zero
/// become 0, which selects the default.
#[must_use]
pub fn retain_count_from(count: i64) -> usize {
    usize::try_from(count.max(0)).unwrap_or(usize::MAX)
}

fn deserialize_retain_count<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(retain_count_from)
}

fn deserialize_byte_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ByteSize {
        Bytes(u64),
        Text(String),
    }

    match ByteSize::deserialize(deserializer)? {
        ByteSize::Bytes(n) => Ok(n),
        ByteSize::Text(s) => parse_byte_size(&s).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn config_defaults() {
        let config = SinkConfig::default();
        assert!(config.path.as_os_str().is_empty());
        assert_eq!(config.max_size, 0);
        assert_eq!(config.retain_count, 0);
        assert_eq!(config.name_pattern, DEFAULT_NAME_PATTERN);
    }

    #[test]
    fn config_builder() {
        let config = SinkConfig::new("/var/log/app.log")
            .with_max_size(5 * 1024 * 1024)
            .with_retain_count(7)
            .with_name_pattern(".yyyyMMdd");

        assert_eq!(config.path, PathBuf::from("/var/log/app.log"));
        assert_eq!(config.max_size, 5 * 1024 * 1024);
        assert_eq!(config.retain_count, 7);
        assert_eq!(config.name_pattern, ".yyyyMMdd");
    }

    #[test]
    fn validate_requires_path() {
        let err = SinkConfig::default().validate();
        assert!(matches!(err, Err(SinkError::Configuration(_))));

        assert!(SinkConfig::new("app.log").validate().is_ok());
    }

    #[test]
    fn validate_rejects_directory_like_path() {
        let err = SinkConfig::new("/var/log/..").validate();
        assert!(matches!(err, Err(SinkError::Configuration(_))));
    }

    #[test]
    fn trigger_policy_from_max_size() {
        assert_eq!(SinkConfig::new("a").trigger_policy(), TriggerPolicy::Never);
        assert_eq!(
            SinkConfig::new("a").with_max_size(100).trigger_policy(),
            TriggerPolicy::Size { max_bytes: 100 }
        );
    }

    #[test]
    fn retention_defaults_to_one_when_rotating() {
        let config = SinkConfig::new("a").with_max_size(100);
        assert_eq!(config.retention_policy(), RetentionPolicy::Count(1));
    }

    #[test]
    fn retention_unbounded_without_rotation() {
        let config = SinkConfig::new("a");
        assert_eq!(config.retention_policy(), RetentionPolicy::Unbounded);
    }

    #[test]
    fn retention_explicit_count() {
        let config = SinkConfig::new("a").with_max_size(100).with_retain_count(3);
        assert_eq!(config.retention_policy(), RetentionPolicy::Count(3));

        let config = SinkConfig::new("a").with_retain_count(3);
        assert_eq!(config.retention_policy(), RetentionPolicy::Count(3));
    }

    #[test_case("0" => 0)]
    #[test_case("1024" => 1024)]
    #[test_case("512K" => 512 * 1024)]
    #[test_case("10MB" => 10 * 1024 * 1024)]
    #[test_case("1g" => 1024 * 1024 * 1024)]
    #[test_case(" 2 KiB " => 2048)]
    #[test_case("7b" => 7)]
    fn parse_byte_size_valid(input: &str) -> u64 {
        parse_byte_size(input).expect("valid size")
    }

    #[test_case("")]
    #[test_case("M")]
    #[test_case("12T")]
    #[test_case("-5")]
    #[test_case("99999999999999999999G")]
    fn parse_byte_size_invalid(input: &str) {
        assert!(matches!(
            parse_byte_size(input),
            Err(SinkError::Configuration(_))
        ));
    }

    #[test]
    fn from_json_full() {
        let config = SinkConfig::from_json(
            r#"{"path": "/tmp/app.log", "max_size": "1M", "retain_count": 4}"#,
        )
        .expect("parse config");

        assert_eq!(config.path, PathBuf::from("/tmp/app.log"));
        assert_eq!(config.max_size, 1024 * 1024);
        assert_eq!(config.retain_count, 4);
        assert_eq!(config.name_pattern, DEFAULT_NAME_PATTERN);
    }

    #[test]
    fn from_json_numeric_size() {
        let config = SinkConfig::from_json(r#"{"path": "app.log", "max_size": 100}"#)
            .expect("parse config");
        assert_eq!(config.max_size, 100);
        assert_eq!(config.retain_count, 0);
    }

    #[test]
    fn from_json_missing_path_fails_validation() {
        let config = SinkConfig::from_json(r#"{"max_size": 100}"#).expect("parse config");
        assert!(config.path.as_os_str().is_empty());
        assert!(matches!(
            config.validate(),
            Err(SinkError::Configuration(_))
        ));
    }

    #[test]
    fn from_json_malformed() {
        let err = SinkConfig::from_json("{ not json");
        assert!(matches!(err, Err(SinkError::Configuration(_))));
    }

    #[test_case(r#"{"path": "a.log", "max_size": 100, "retain_count": -1}"# => RetentionPolicy::Count(1); "negative")]
    #[test_case(r#"{"path": "a.log", "max_size": 100, "retain_count": 0}"# => RetentionPolicy::Count(1); "zero")]
    #[test_case(r#"{"path": "a.log", "max_size": 100, "retain_count": 5}"# => RetentionPolicy::Count(5); "positive")]
    #[test_case(r#"{"path": "a.log", "retain_count": -3}"# => RetentionPolicy::Unbounded; "negative without rotation")]
    fn from_json_retain_count(json: &str) -> RetentionPolicy {
        SinkConfig::from_json(json)
            .expect("parse config")
            .retention_policy()
    }

    #[test_case(-1 => 0)]
    #[test_case(i64::MIN => 0)]
    #[test_case(0 => 0)]
    #[test_case(7 => 7)]
    fn retain_count_from_signed(count: i64) -> usize {
        retain_count_from(count)
    }

    #[test]
    fn from_json_bad_size() {
        let err = SinkConfig::from_json(r#"{"path": "a.log", "max_size": "lots"}"#);
        assert!(matches!(err, Err(SinkError::Configuration(_))));
    }
}
