//! Download orchestrator module
//!
//! Drives a [`PageSource`] over a page range and persists every payload in
//! the [`RawStore`].
//!
//! # Overview
//!
//! Each page moves through `Pending -> (Fetching <-> Backoff) ->
//! {Saved | SkippedExisting | Abandoned}`. Rate-limited pages are retried
//! after a fixed pause; any other failure abandons the page at once. A
//! failed page never stops the run.
//!
//! With the default [`RetryPolicy::Attempts`](crate::types::RetryPolicy),
//! `max_retries` caps the requests per page and no backoff follows the last
//! one. [`RetryPolicy::Retries`](crate::types::RetryPolicy) allows
//! `max_retries` backoffs after the first request.

mod types;

pub use types::{
    decide, AbandonReason, DownloadSummary, PageOutcome, PageReport, RetryDecision,
};

use crate::config::{DownloadConfig, PipelineConfig};
use crate::error::Result;
use crate::http::{PageFetcher, PageSource};
use crate::progress;
use crate::store::RawStore;
use crate::types::{PageRange, SkipCheck};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Paginated downloader
pub struct Downloader<S> {
    /// Where pages come from
    source: S,
    /// Where pages go
    store: RawStore,
    /// Retry, throttle and range settings
    settings: DownloadConfig,
}

impl Downloader<PageFetcher> {
    /// Create an HTTP downloader from the full pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let fetcher = PageFetcher::new(&config.api)?;
        let store = RawStore::from_config(&config.storage)?;
        Ok(Self::new(fetcher, store, config.download.clone()))
    }
}

impl<S: PageSource> Downloader<S> {
    /// Create a downloader over any page source
    pub fn new(source: S, store: RawStore, settings: DownloadConfig) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    /// Download the configured page range
    pub async fn run(&self) -> Result<DownloadSummary> {
        self.run_range(self.settings.page_range()).await
    }

    /// Download every page in `range`.
    ///
    /// Only a failure to create the store directory is an error; page-level
    /// problems end up in the summary.
    pub async fn run_range(&self, range: PageRange) -> Result<DownloadSummary> {
        let start = Instant::now();
        self.store.ensure_dir().await?;

        info!(
            %range,
            pages = range.len(),
            dir = %self.store.dir().display(),
            concurrency = self.settings.concurrency,
            "Starting download"
        );

        let progress = progress::bar("download", range.len() as u64);
        let reports: Vec<PageReport> = stream::iter(range.pages())
            .map(|page| self.download_page(page))
            .buffered(self.settings.concurrency.max(1))
            .inspect(|report| {
                progress.set_message(format!("page {}", report.page));
                progress.inc(1);
            })
            .collect()
            .await;
        progress.finish_and_clear();

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let summary = DownloadSummary::from_reports(range, reports, duration_ms);

        info!(
            saved = summary.saved,
            skipped = summary.skipped,
            abandoned = summary.abandoned,
            requests = summary.requests,
            duration_ms,
            "Download finished"
        );
        Ok(summary)
    }

    /// Run one page through the fetch/backoff/persist cycle
    pub async fn download_page(&self, page: u32) -> PageReport {
        if self.settings.skip_check == SkipCheck::BeforeFetch && self.store.exists(page).await {
            debug!(page, "Already stored, skipping");
            return PageReport::new(page, PageOutcome::SkippedExisting, 0, 0);
        }

        let mut retries_left = self.settings.retry_budget();
        let mut attempts = 0;
        let mut backoffs = 0;

        loop {
            attempts += 1;
            let outcome = self.source.fetch_page(page).await;
            debug!(page, attempt = attempts, outcome = outcome.kind(), "Fetched");

            match decide(outcome, retries_left) {
                RetryDecision::Accept(payload) => {
                    let outcome = self.persist(page, &payload).await;
                    return PageReport::new(page, outcome, attempts, backoffs);
                }
                RetryDecision::Retry => {
                    retries_left -= 1;
                    backoffs += 1;
                    warn!(
                        page,
                        retries_left,
                        wait_secs = self.settings.retry_wait_secs,
                        "Rate limited (429), backing off"
                    );
                    tokio::time::sleep(self.settings.retry_wait()).await;
                }
                RetryDecision::Abandon(reason) => {
                    warn!(page, attempts, %reason, "Abandoning page");
                    return PageReport::new(page, PageOutcome::abandoned(reason), attempts, backoffs);
                }
            }
        }
    }

    /// Write a fetched payload unless the page is already stored
    async fn persist(&self, page: u32, payload: &Value) -> PageOutcome {
        if self.settings.skip_check == SkipCheck::AfterFetch && self.store.exists(page).await {
            debug!(page, "Fetched but already stored, skipping");
            return PageOutcome::SkippedExisting;
        }

        match self.store.write(page, payload).await {
            Ok(_) => {
                debug!(page, "Saved");
                tokio::time::sleep(self.settings.throttle()).await;
                PageOutcome::Saved
            }
            Err(e) => {
                warn!(page, error = %e, "Abandoning page");
                PageOutcome::abandoned(AbandonReason::StoreError(e.to_string()))
            }
        }
    }
}

impl<S> std::fmt::Debug for Downloader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
