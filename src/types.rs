//! Common types used throughout gastos-etl
//!
//! Shared type definitions and small enums that appear both in the
//! configuration file and in the component APIs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type, i.e. one record
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Page Range
// ============================================================================

/// Inclusive range of page numbers to download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// Create a new range; `start > end` yields an empty range
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of pages in the range
    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    /// Whether the range has no pages
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the page numbers in ascending order
    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// ============================================================================
// Skip Check
// ============================================================================

/// When the downloader checks the raw store for an existing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCheck {
    /// Skip stored pages without touching the network
    #[default]
    BeforeFetch,
    /// Fetch first, then skip if the page is already stored
    AfterFetch,
}

// ============================================================================
// Retry Policy
// ============================================================================

/// What `download.max_retries` counts for a rate-limited page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Total requests per page; no backoff after the last one
    #[default]
    Attempts,
    /// Retries after the first request, each preceded by a backoff
    Retries,
}

impl RetryPolicy {
    /// Backoffs a page may take before it is abandoned
    pub fn retry_budget(self, max_retries: u32) -> u32 {
        match self {
            Self::Attempts => max_retries.saturating_sub(1),
            Self::Retries => max_retries,
        }
    }
}

// ============================================================================
// Compression
// ============================================================================

/// Parquet column compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Gzip,
    Snappy,
    Zstd,
    Uncompressed,
}

// ============================================================================
// Write Mode
// ============================================================================

/// How the partitioned writer treats an existing destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Delete the destination, then write every partition
    #[default]
    Rebuild,
    /// Keep existing partition files and add new ones next to them
    Append,
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rebuild" => Ok(Self::Rebuild),
            "append" => Ok(Self::Append),
            other => Err(format!("unknown write mode '{other}'")),
        }
    }
}

impl std::str::FromStr for SkipCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before_fetch" => Ok(Self::BeforeFetch),
            "after_fetch" => Ok(Self::AfterFetch),
            other => Err(format!("unknown skip check '{other}'")),
        }
    }
}

impl std::str::FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attempts" => Ok(Self::Attempts),
            "retries" => Ok(Self::Retries),
            other => Err(format!("unknown retry policy '{other}'")),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            other => Err(format!("unknown compression '{other}'")),
        }
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}
