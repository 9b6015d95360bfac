// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # gastos-etl
//!
//! Batch pipeline for a paginated public spending API (brasil.io
//! `gastos-diretos`). Pages are downloaded to one JSON file each, then
//! consolidated into a Parquet dataset partitioned by year and month.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gastos_etl::{Pipeline, PipelineConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::load(Some("gastos.yaml".as_ref()))?;
//!     let report = Pipeline::new(config).run().await?;
//!     println!("{}", serde_json::to_string(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   pages   ┌────────────┐  records  ┌──────────────────┐
//! │  Downloader  │ ────────► │  RawStore  │ ────────► │ RecordAggregator │
//! │ (PageSource, │           │ page_N.json│           └────────┬─────────┘
//! │  retry/429)  │           └────────────┘                    │
//! └──────────────┘                                             ▼
//!                    ano=2020/mes=1/part-0.parquet  ┌──────────────────┐
//!                  ◄─────────────────────────────── │ PartitionedWriter│
//!                                                   └──────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Pipeline configuration
pub mod config;

/// HTTP page fetcher with optional rate limiting
pub mod http;

/// Raw JSON document store
pub mod store;

/// Download orchestration with retry/backoff
pub mod download;

/// Record aggregation over the raw store
pub mod aggregate;

/// Arrow/Parquet output and partitioned dataset reader
pub mod output;

/// Terminal progress bars
pub mod progress;

/// End-to-end pipeline stages
pub mod pipeline;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use download::{DownloadSummary, Downloader};
pub use pipeline::{ConsolidateOutcome, Pipeline, RunReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
