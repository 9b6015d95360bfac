//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Download paginated public spending data and consolidate it into Parquet
#[derive(Parser, Debug)]
#[command(name = "gastos-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for summaries
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download pages into the raw store
    Download(RangeArgs),

    /// Consolidate the raw store into the partitioned dataset
    Consolidate,

    /// Download, then consolidate
    Run(RangeArgs),

    /// Summarize the partitioned dataset
    Inspect,

    /// Print the effective configuration (token masked)
    Config,
}

/// Page range overrides
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// First page to download
    #[arg(long)]
    pub start: Option<u32>,

    /// Last page to download (inclusive)
    #[arg(long)]
    pub end: Option<u32>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one summary per line)
    Json,
    /// Indented JSON
    Pretty,
}
