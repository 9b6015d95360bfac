//! Download types
//!
//! Per-page outcomes, the retry decision and run statistics.

use crate::http::FetchOutcome;
use crate::types::PageRange;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Why a page was given up on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// Still rate limited after every allowed retry
    RetriesExhausted,
    /// Non-429 error status
    HttpError(u16),
    /// Connection failure or timeout
    ConnectionError(String),
    /// Body was not JSON
    MalformedResponse(String),
    /// Unclassified fetch failure
    UnexpectedError(String),
    /// The document could not be written
    StoreError(String),
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted => write!(f, "still rate limited after all retries"),
            Self::HttpError(status) => write!(f, "HTTP {status}"),
            Self::ConnectionError(detail) => write!(f, "connection error: {detail}"),
            Self::MalformedResponse(detail) => write!(f, "malformed response: {detail}"),
            Self::UnexpectedError(detail) => write!(f, "unexpected error: {detail}"),
            Self::StoreError(detail) => write!(f, "store error: {detail}"),
        }
    }
}

/// Final state of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageOutcome {
    /// Fetched and written to the raw store
    Saved,
    /// Already in the raw store, left untouched
    SkippedExisting,
    /// Given up on; nothing was written
    Abandoned { reason: AbandonReason },
}

impl PageOutcome {
    /// Create an abandoned outcome
    pub fn abandoned(reason: AbandonReason) -> Self {
        Self::Abandoned { reason }
    }
}

/// What the downloader does after one fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Keep the payload
    Accept(Value),
    /// Back off, then fetch again
    Retry,
    /// Stop working on this page
    Abandon(AbandonReason),
}

/// Decide what follows a fetch, given the retries still available.
///
/// Only rate limiting is retried; every other failure abandons the page.
pub fn decide(outcome: FetchOutcome, retries_left: u32) -> RetryDecision {
    match outcome {
        FetchOutcome::Success(payload) => RetryDecision::Accept(payload),
        FetchOutcome::RateLimited if retries_left > 0 => RetryDecision::Retry,
        FetchOutcome::RateLimited => RetryDecision::Abandon(AbandonReason::RetriesExhausted),
        FetchOutcome::HttpError(status) => RetryDecision::Abandon(AbandonReason::HttpError(status)),
        FetchOutcome::ConnectionError(detail) => {
            RetryDecision::Abandon(AbandonReason::ConnectionError(detail))
        }
        FetchOutcome::MalformedResponse(detail) => {
            RetryDecision::Abandon(AbandonReason::MalformedResponse(detail))
        }
        FetchOutcome::UnexpectedError(detail) => {
            RetryDecision::Abandon(AbandonReason::UnexpectedError(detail))
        }
    }
}

/// Report for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReport {
    /// Page number
    pub page: u32,
    /// Final state
    #[serde(flatten)]
    pub outcome: PageOutcome,
    /// Network requests issued for the page
    pub attempts: u32,
    /// Backoff sleeps taken after 429 responses
    pub backoffs: u32,
}

impl PageReport {
    /// Create a page report
    pub fn new(page: u32, outcome: PageOutcome, attempts: u32, backoffs: u32) -> Self {
        Self {
            page,
            outcome,
            attempts,
            backoffs,
        }
    }
}

/// Statistics from a download run
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSummary {
    /// Requested page range
    pub range: PageRange,
    /// Pages written this run
    pub saved: usize,
    /// Pages already present
    pub skipped: usize,
    /// Pages given up on
    pub abandoned: usize,
    /// Network requests issued
    pub requests: u64,
    /// Backoff sleeps taken
    pub backoffs: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Per-page reports, in page order
    pub pages: Vec<PageReport>,
}

impl DownloadSummary {
    /// Build a summary from per-page reports
    pub fn from_reports(range: PageRange, pages: Vec<PageReport>, duration_ms: u64) -> Self {
        let mut summary = Self {
            range,
            saved: 0,
            skipped: 0,
            abandoned: 0,
            requests: 0,
            backoffs: 0,
            duration_ms,
            pages: Vec::new(),
        };

        for report in &pages {
            match report.outcome {
                PageOutcome::Saved => summary.saved += 1,
                PageOutcome::SkippedExisting => summary.skipped += 1,
                PageOutcome::Abandoned { .. } => summary.abandoned += 1,
            }
            summary.requests += u64::from(report.attempts);
            summary.backoffs += u64::from(report.backoffs);
        }

        summary.pages = pages;
        summary
    }

    /// Report for `page`, if it was part of the run
    pub fn page(&self, page: u32) -> Option<&PageReport> {
        self.pages.iter().find(|r| r.page == page)
    }

    /// Pages given up on, in page order
    pub fn abandoned_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|r| matches!(r.outcome, PageOutcome::Abandoned { .. }))
            .map(|r| r.page)
            .collect()
    }
}
