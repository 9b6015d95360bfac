//! Pipeline stages
//!
//! Wires the components together from one [`PipelineConfig`]:
//! download into the raw store, consolidate the raw store into the
//! partitioned dataset, or both in sequence.

use crate::aggregate::{Aggregation, RecordAggregator};
use crate::config::PipelineConfig;
use crate::download::{DownloadSummary, Downloader};
use crate::error::Result;
use crate::http::PageSource;
use crate::output::{summarize_dataset, DatasetSummary, PartitionedWriter, WriteSummary};
use crate::store::RawStore;
use serde::Serialize;
use tracing::{info, warn};

/// What a consolidation did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsolidateOutcome {
    /// The raw store held no records; the writer was not invoked
    NothingToDo { aggregation: Aggregation },
    /// Records were written to the partitioned dataset
    Written {
        aggregation: Aggregation,
        write: WriteSummary,
    },
}

impl ConsolidateOutcome {
    /// Write summary, if anything was written
    pub fn write_summary(&self) -> Option<&WriteSummary> {
        match self {
            Self::Written { write, .. } => Some(write),
            Self::NothingToDo { .. } => None,
        }
    }
}

/// Report of a full download + consolidate run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub download: DownloadSummary,
    pub consolidate: ConsolidateOutcome,
}

/// The ETL pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline over a validated configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Download the configured page range over HTTP
    pub async fn download(&self) -> Result<DownloadSummary> {
        Downloader::from_config(&self.config)?.run().await
    }

    /// Download the configured page range from any page source
    pub async fn download_from<S: PageSource>(&self, source: S) -> Result<DownloadSummary> {
        let store = RawStore::from_config(&self.config.storage)?;
        Downloader::new(source, store, self.config.download.clone())
            .run()
            .await
    }

    /// Aggregate the raw store and write the partitioned dataset
    pub async fn consolidate(&self) -> Result<ConsolidateOutcome> {
        let store = RawStore::from_config(&self.config.storage)?;
        let aggregation = RecordAggregator::new(&self.config.storage.results_field)
            .aggregate(&store)
            .await?;

        if aggregation.is_empty() {
            warn!(dir = %store.dir().display(), "No records found, nothing to do");
            return Ok(ConsolidateOutcome::NothingToDo { aggregation });
        }

        let writer =
            PartitionedWriter::from_config(&self.config.storage.bronze_dir, &self.config.partition);
        let write = writer.write(&aggregation.records)?;
        Ok(ConsolidateOutcome::Written { aggregation, write })
    }

    /// Download, then consolidate whatever the raw store holds
    pub async fn run(&self) -> Result<RunReport> {
        let download = self.download().await?;
        self.finish_run(download).await
    }

    /// [`run`](Self::run) with a custom page source
    pub async fn run_from<S: PageSource>(&self, source: S) -> Result<RunReport> {
        let download = self.download_from(source).await?;
        self.finish_run(download).await
    }

    async fn finish_run(&self, download: DownloadSummary) -> Result<RunReport> {
        if download.abandoned > 0 {
            warn!(
                pages = ?download.abandoned_pages(),
                "Some pages were abandoned; consolidating what was saved"
            );
        }

        let consolidate = self.consolidate().await?;
        info!(
            saved = download.saved,
            rows = consolidate.write_summary().map_or(0, |w| w.rows_written),
            "Pipeline finished"
        );
        Ok(RunReport {
            download,
            consolidate,
        })
    }

    /// Summarize the partitioned dataset
    pub fn inspect(&self) -> Result<DatasetSummary> {
        summarize_dataset(
            &self.config.storage.bronze_dir,
            &self.config.partition.columns,
            &self.config.inspect.drop_columns,
        )
    }
}
