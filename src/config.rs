//! Pipeline configuration
//!
//! Every knob of the pipeline lives in [`PipelineConfig`]. Values come from
//! the built-in defaults, then an optional YAML (or JSON) file, then
//! `GASTOS_*` environment variables, and are validated once merged.

use crate::error::{Error, Result};
use crate::types::{Compression, OptionStringExt, PageRange, RetryPolicy, SkipCheck, WriteMode};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "GASTOS_";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Remote API settings
    pub api: ApiConfig,

    /// Download loop settings
    pub download: DownloadConfig,

    /// Local paths and file naming
    pub storage: StorageConfig,

    /// Partitioned dataset settings
    pub partition: PartitionConfig,

    /// Dataset inspection settings
    pub inspect: InspectConfig,
}

// ============================================================================
// API
// ============================================================================

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Paginated endpoint, without the page query parameter
    pub endpoint: String,

    /// Value of the `Authorization` header, sent verbatim.
    /// `${VAR}` is expanded from the environment.
    #[serde(deserialize_with = "deserialize_env_var")]
    pub token: Option<String>,

    /// Query parameter carrying the page number
    pub page_param: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Optional cap on requests per second
    pub requests_per_second: Option<u32>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://brasil.io/api/v1/dataset/gastos-diretos/gastos/data".to_string(),
            token: None,
            page_param: "page".to_string(),
            request_timeout_secs: 10,
            requests_per_second: None,
        }
    }
}

// ============================================================================
// Download
// ============================================================================

/// Download loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// First page to download (inclusive)
    pub start_page: u32,

    /// Last page to download (inclusive)
    pub end_page: u32,

    /// Rate-limit budget per page, read according to `retry_policy`
    pub max_retries: u32,

    /// Whether `max_retries` counts total attempts or retries
    pub retry_policy: RetryPolicy,

    /// Backoff before retrying a rate-limited page, in seconds
    pub retry_wait_secs: f64,

    /// Pause after each saved page, in seconds
    pub throttle_secs: f64,

    /// When to look for an already stored page
    pub skip_check: SkipCheck,

    /// Pages processed at the same time
    pub concurrency: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            end_page: 1000,
            max_retries: 3,
            retry_policy: RetryPolicy::Attempts,
            retry_wait_secs: 15.0,
            throttle_secs: 0.3,
            skip_check: SkipCheck::BeforeFetch,
            concurrency: 1,
        }
    }
}

impl DownloadConfig {
    /// Configured page range
    pub fn page_range(&self) -> PageRange {
        PageRange::new(self.start_page, self.end_page)
    }

    /// Backoffs a rate-limited page may take before it is abandoned
    pub fn retry_budget(&self) -> u32 {
        self.retry_policy.retry_budget(self.max_retries)
    }

    /// Backoff before a retry
    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs_f64(self.retry_wait_secs)
    }

    /// Pause after a saved page
    pub fn throttle(&self) -> Duration {
        Duration::from_secs_f64(self.throttle_secs)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Local paths and file naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON document per page
    pub raw_dir: PathBuf,

    /// File name prefix for raw documents (`{prefix}{page}.json`)
    pub file_prefix: String,

    /// Top-level field of a raw document holding the records
    pub results_field: String,

    /// Root of the partitioned Parquet dataset
    pub bronze_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("dataset/raw"),
            file_prefix: "gastos_pagina_".to_string(),
            results_field: "results".to_string(),
            bronze_dir: PathBuf::from("dataset/bronze"),
        }
    }
}

// ============================================================================
// Partition
// ============================================================================

/// Partitioned dataset settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Integer-valued columns used as partition keys, outermost first
    pub columns: Vec<String>,

    /// Rebuild or append on an existing destination
    pub write_mode: WriteMode,

    /// Parquet column compression
    pub compression: Compression,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            columns: vec!["ano".to_string(), "mes".to_string()],
            write_mode: WriteMode::Rebuild,
            compression: Compression::Gzip,
        }
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// Dataset inspection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Columns left out of the summary
    pub drop_columns: Vec<String>,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            drop_columns: vec![
                "codigo_elemento_despesa".to_string(),
                "codigo_funcao".to_string(),
            ],
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl PipelineConfig {
    /// Load configuration: defaults, optional file, environment, validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, optional file and environment, without validation.
    ///
    /// For callers that apply further overrides before validating.
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a YAML or JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config from a YAML (or JSON) string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override fields from `GASTOS_*` variables resolved through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).none_if_empty();

        if let Some(v) = get("API_ENDPOINT") {
            self.api.endpoint = v;
        }
        if let Some(v) = get("API_TOKEN") {
            self.api.token = Some(v);
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = parse_env("REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("REQUESTS_PER_SECOND") {
            self.api.requests_per_second = Some(parse_env("REQUESTS_PER_SECOND", &v)?);
        }
        if let Some(v) = get("START_PAGE") {
            self.download.start_page = parse_env("START_PAGE", &v)?;
        }
        if let Some(v) = get("END_PAGE") {
            self.download.end_page = parse_env("END_PAGE", &v)?;
        }
        if let Some(v) = get("MAX_RETRIES") {
            self.download.max_retries = parse_env("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("RETRY_POLICY") {
            self.download.retry_policy = parse_env("RETRY_POLICY", &v)?;
        }
        if let Some(v) = get("RETRY_WAIT_SECS") {
            self.download.retry_wait_secs = parse_env("RETRY_WAIT_SECS", &v)?;
        }
        if let Some(v) = get("THROTTLE_SECS") {
            self.download.throttle_secs = parse_env("THROTTLE_SECS", &v)?;
        }
        if let Some(v) = get("SKIP_CHECK") {
            self.download.skip_check = parse_env("SKIP_CHECK", &v)?;
        }
        if let Some(v) = get("CONCURRENCY") {
            self.download.concurrency = parse_env("CONCURRENCY", &v)?;
        }
        if let Some(v) = get("RAW_DIR") {
            self.storage.raw_dir = PathBuf::from(v);
        }
        if let Some(v) = get("BRONZE_DIR") {
            self.storage.bronze_dir = PathBuf::from(v);
        }
        if let Some(v) = get("RESULTS_FIELD") {
            self.storage.results_field = v;
        }
        if let Some(v) = get("PARTITION_COLUMNS") {
            self.partition.columns = v
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("WRITE_MODE") {
            self.partition.write_mode = parse_env("WRITE_MODE", &v)?;
        }
        if let Some(v) = get("COMPRESSION") {
            self.partition.compression = parse_env("COMPRESSION", &v)?;
        }

        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.endpoint)
            .map_err(|e| Error::invalid_value("api.endpoint", e.to_string()))?;

        if self.api.request_timeout_secs == 0 {
            return Err(Error::invalid_value(
                "api.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.api.requests_per_second == Some(0) {
            return Err(Error::invalid_value(
                "api.requests_per_second",
                "must be greater than zero when set",
            ));
        }
        if self.download.start_page > self.download.end_page {
            return Err(Error::invalid_value(
                "download.start_page",
                format!(
                    "start page {} is after end page {}",
                    self.download.start_page, self.download.end_page
                ),
            ));
        }
        for (field, secs) in [
            ("download.retry_wait_secs", self.download.retry_wait_secs),
            ("download.throttle_secs", self.download.throttle_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(Error::invalid_value(field, "must be a non-negative number"));
            }
        }
        if self.download.concurrency == 0 {
            return Err(Error::invalid_value(
                "download.concurrency",
                "must be at least 1",
            ));
        }
        if self.storage.results_field.is_empty() {
            return Err(Error::invalid_value(
                "storage.results_field",
                "must not be empty",
            ));
        }
        let raw_dir = normalize_path(&self.storage.raw_dir);
        let bronze_dir = normalize_path(&self.storage.bronze_dir);
        if raw_dir.starts_with(&bronze_dir) || bronze_dir.starts_with(&raw_dir) {
            return Err(Error::invalid_value(
                "storage.bronze_dir",
                format!(
                    "'{}' and raw_dir '{}' must not contain one another",
                    self.storage.bronze_dir.display(),
                    self.storage.raw_dir.display()
                ),
            ));
        }
        if self.partition.columns.is_empty() {
            return Err(Error::invalid_value(
                "partition.columns",
                "at least one partition column is required",
            ));
        }
        if self
            .partition
            .columns
            .iter()
            .any(|c| c.is_empty() || c.contains(['/', '=']))
        {
            return Err(Error::invalid_value(
                "partition.columns",
                "column names must be non-empty and contain neither '/' nor '='",
            ));
        }

        Ok(())
    }

    /// Copy with the token replaced, safe to print
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        if masked.api.token.is_some() {
            masked.api.token = Some("***".to_string());
        }
        masked
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid_value(format!("{ENV_PREFIX}{name}"), format!("{e}")))
}

/// Deserialize a string that may reference an environment variable like `${VAR}`
fn deserialize_env_var<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand `${VAR}` to the variable's value; other strings pass through
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}
