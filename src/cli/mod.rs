//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `download` - Fetch pages into the raw store
//! - `consolidate` - Write the raw store out as partitioned Parquet
//! - `run` - Both, in sequence
//! - `inspect` - Summarize the partitioned dataset
//! - `config` - Print the effective configuration

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, RangeArgs};
pub use runner::Runner;
