//! Appender configuration.
//!
//! Configuration is captured once when the appender is built. It can be
//! loaded from TOML or JSON, overridden from `LOGSHIP_*` environment
//! variables, and is validated before use. Buffer sizes above the store's
//! per-operation limit are clamped rather than rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShipError};
use crate::executor::ExecutorSettings;
use crate::types::{MAX_ATTRIBUTE_VALUE_BYTES, MAX_ITEMS_PER_BATCH};

/// Environment variable overriding [`AppenderConfig::region`].
pub const ENV_REGION: &str = "LOGSHIP_REGION";
/// Environment variable overriding [`AppenderConfig::collection_prefix`].
pub const ENV_COLLECTION_PREFIX: &str = "LOGSHIP_COLLECTION_PREFIX";
/// Environment variable overriding [`AppenderConfig::buffer_size`].
pub const ENV_BUFFER_SIZE: &str = "LOGSHIP_BUFFER_SIZE";
/// Environment variable overriding [`AppenderConfig::retry`].
pub const ENV_RETRY: &str = "LOGSHIP_RETRY";

const MAX_PREFIX_LEN: usize = 200;

/// Configuration for a [`StoreAppender`](crate::appender::StoreAppender).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppenderConfig {
    /// Store region identifier.
    pub region: String,
    /// Prefix of the monthly collection names.
    pub collection_prefix: String,
    /// Events buffered before a flush, `1..=25`.
    pub buffer_size: usize,
    /// Client errors tolerated per batch; `0` still makes one attempt.
    pub retry: u32,
    /// Maximum attribute value length in bytes.
    pub max_value_len: usize,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            region: "ap-northeast-1".to_string(),
            collection_prefix: "MyDomain".to_string(),
            buffer_size: 1,
            retry: 3,
            max_value_len: MAX_ATTRIBUTE_VALUE_BYTES,
        }
    }
}

impl AppenderConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the collection prefix.
    #[must_use]
    pub fn with_collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.collection_prefix = prefix.into();
        self
    }

    /// Sets the buffer size, clamped to `1..=25`.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.set_buffer_size(buffer_size);
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub const fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the maximum attribute value length, clamped to `1..=1024`.
    #[must_use]
    pub fn with_max_value_len(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len.clamp(1, MAX_ATTRIBUTE_VALUE_BYTES);
        self
    }

    /// Sets the buffer size, returning the effective value.
    pub fn set_buffer_size(&mut self, buffer_size: usize) -> usize {
        let clamped = buffer_size.clamp(1, MAX_ITEMS_PER_BATCH);
        if clamped != buffer_size {
            tracing::warn!(
                target: "claw_logship",
                requested = buffer_size,
                effective = clamped,
                "buffer size clamped"
            );
        }
        self.buffer_size = clamped;
        clamped
    }

    /// Load configuration from a TOML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShipError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validated()
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validated()
    }

    /// Defaults overridden by `LOGSHIP_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up through `lookup`, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or the result is invalid.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(region) = lookup(ENV_REGION) {
            self.region = region;
        }
        if let Some(prefix) = lookup(ENV_COLLECTION_PREFIX) {
            self.collection_prefix = prefix;
        }
        if let Some(size) = lookup(ENV_BUFFER_SIZE) {
            self.buffer_size = size.trim().parse().map_err(|_| {
                ShipError::Config(format!("{ENV_BUFFER_SIZE} must be a positive integer, got '{size}'"))
            })?;
        }
        if let Some(retry) = lookup(ENV_RETRY) {
            self.retry = retry.trim().parse().map_err(|_| {
                ShipError::Config(format!("{ENV_RETRY} must be a non-negative integer, got '{retry}'"))
            })?;
        }
        self.validated()
    }

    /// Clamps out-of-range sizes and validates the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validated(mut self) -> Result<Self> {
        if self.buffer_size == 0 {
            return Err(ShipError::Config(
                "buffer_size must be greater than 0".to_string(),
            ));
        }
        self.set_buffer_size(self.buffer_size);
        self.max_value_len = self.max_value_len.clamp(1, MAX_ATTRIBUTE_VALUE_BYTES);
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(ShipError::Config("region cannot be empty".to_string()));
        }

        if self.collection_prefix.is_empty() {
            return Err(ShipError::Config(
                "collection_prefix cannot be empty".to_string(),
            ));
        }

        if self.collection_prefix.len() > MAX_PREFIX_LEN {
            return Err(ShipError::Config(format!(
                "collection_prefix cannot exceed {MAX_PREFIX_LEN} characters"
            )));
        }

        if !self
            .collection_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ShipError::Config(
                "collection_prefix must contain only alphanumeric characters, hyphens, underscores, and dots"
                    .to_string(),
            ));
        }

        if !(1..=MAX_ITEMS_PER_BATCH).contains(&self.buffer_size) {
            return Err(ShipError::Config(format!(
                "buffer_size must be between 1 and {MAX_ITEMS_PER_BATCH}"
            )));
        }

        if self.max_value_len == 0 {
            return Err(ShipError::Config(
                "max_value_len must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings handed to the write executor.
    #[must_use]
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            region: self.region.clone(),
            collection_prefix: self.collection_prefix.clone(),
            retry: self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    fn create_temp_config(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("failed to write temp file");
        file
    }

    #[test]
    fn defaults() {
        let config = AppenderConfig::default();
        assert_eq!(config.region, "ap-northeast-1");
        assert_eq!(config.collection_prefix, "MyDomain");
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.retry, 3);
        assert_eq!(config.max_value_len, 1024);
        assert!(config.validate().is_ok());
    }

    #[test_case(100 => 25; "above cap")]
    #[test_case(25 => 25; "at cap")]
    #[test_case(10 => 10; "within range")]
    #[test_case(0 => 1; "zero raised")]
    fn buffer_size_setter_clamps(requested: usize) -> usize {
        AppenderConfig::new().with_buffer_size(requested).buffer_size
    }

    #[test]
    fn set_buffer_size_reports_effective_value() {
        let mut config = AppenderConfig::new();
        assert_eq!(config.set_buffer_size(100), 25);
        assert_eq!(config.buffer_size, 25);
    }

    #[test]
    fn parse_minimal_toml() {
        let config = AppenderConfig::from_toml(r#"collection_prefix = "Logs""#)
            .expect("should parse minimal config");
        assert_eq!(config.collection_prefix, "Logs");
        assert_eq!(config.region, "ap-northeast-1");
        assert_eq!(config.retry, 3);
    }

    #[test]
    fn parse_full_toml_clamps_buffer() {
        let toml = r#"
            region = "us-west-2"
            collection_prefix = "app.prod"
            buffer_size = 100
            retry = 0
            max_value_len = 512
        "#;
        let config = AppenderConfig::from_toml(toml).expect("should parse");
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.buffer_size, 25);
        assert_eq!(config.retry, 0);
        assert_eq!(config.max_value_len, 512);
    }

    #[test]
    fn negative_retry_is_rejected() {
        let result = AppenderConfig::from_toml("retry = -1");
        assert!(matches!(result, Err(ShipError::Toml(_))));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let result = AppenderConfig::from_toml("buffer_size = 0");
        assert!(matches!(result, Err(ShipError::Config(_))));
    }

    #[test_case("" ; "empty")]
    #[test_case("my logs" ; "space")]
    #[test_case("logs/2024" ; "slash")]
    fn invalid_prefix(prefix: &str) {
        let config = AppenderConfig::new().with_collection_prefix(prefix);
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlong_prefix() {
        let config = AppenderConfig::new().with_collection_prefix("a".repeat(201));
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_region_is_rejected() {
        let config = AppenderConfig::new().with_region("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_json() {
        let config = AppenderConfig::from_json(r#"{"collection_prefix":"Audit","retry":5}"#)
            .expect("should parse");
        assert_eq!(config.collection_prefix, "Audit");
        assert_eq!(config.retry, 5);
    }

    #[test]
    fn load_from_files() {
        let file = create_temp_config("collection_prefix = \"FromToml\"\n", ".toml");
        let config = AppenderConfig::from_file(file.path()).expect("load toml");
        assert_eq!(config.collection_prefix, "FromToml");

        let file = create_temp_config(r#"{"collection_prefix":"FromJson"}"#, ".json");
        let config = AppenderConfig::from_file(file.path()).expect("load json");
        assert_eq!(config.collection_prefix, "FromJson");
    }

    #[test]
    fn missing_file() {
        let result = AppenderConfig::from_file("/nonexistent/logship.toml");
        assert!(matches!(result, Err(ShipError::Config(msg)) if msg.contains("failed to read")));
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_REGION, "eu-west-1"),
            (ENV_COLLECTION_PREFIX, "EnvLogs"),
            (ENV_BUFFER_SIZE, "50"),
            (ENV_RETRY, "7"),
        ]
        .into_iter()
        .collect();

        let config = AppenderConfig::default()
            .apply_env(|k| vars.get(k).map(|v| (*v).to_string()))
            .expect("apply env");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.collection_prefix, "EnvLogs");
        assert_eq!(config.buffer_size, 25);
        assert_eq!(config.retry, 7);
    }

    #[test]
    fn env_parse_errors() {
        let result = AppenderConfig::default()
            .apply_env(|k| (k == ENV_RETRY).then(|| "-2".to_string()));
        assert!(matches!(result, Err(ShipError::Config(msg)) if msg.contains(ENV_RETRY)));

        let result = AppenderConfig::default()
            .apply_env(|k| (k == ENV_BUFFER_SIZE).then(|| "many".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn executor_settings_mirror_config() {
        let config = AppenderConfig::new()
            .with_region("us-east-1")
            .with_collection_prefix("Logs")
            .with_retry(0);
        let settings = config.executor_settings();
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.collection_prefix, "Logs");
        assert_eq!(settings.attempt_limit(), 1);
    }
}
