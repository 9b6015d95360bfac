//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, RangeArgs};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::Pipeline;
use serde::Serialize;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let range = match &self.cli.command {
            Commands::Download(range) | Commands::Run(range) => range.clone(),
            _ => RangeArgs::default(),
        };
        let config = self.load_config(&range)?;

        if matches!(self.cli.command, Commands::Config) {
            return self.output(&config.masked());
        }

        let pipeline = Pipeline::new(config);
        match &self.cli.command {
            Commands::Download(_) => self.output(&pipeline.download().await?),
            Commands::Consolidate => self.output(&pipeline.consolidate().await?),
            Commands::Run(_) => self.output(&pipeline.run().await?),
            Commands::Inspect => self.output(&pipeline.inspect()?),
            Commands::Config => Ok(()),
        }
    }

    /// Load configuration, apply command-line overrides, then validate
    fn load_config(&self, range: &RangeArgs) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load_unvalidated(self.cli.config.as_deref())?;

        if let Some(start) = range.start {
            config.download.start_page = start;
        }
        if let Some(end) = range.end {
            config.download.end_page = end;
        }
        config.validate()?;

        debug!(range = %config.download.page_range(), "Configuration loaded");
        Ok(config)
    }

    /// Print a summary
    fn output<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", self.render(value)?);
        Ok(())
    }

    fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        };
        Ok(text)
    }
}
