//! Page fetcher module
//!
//! One HTTP GET per page, classified into a [`FetchOutcome`].
//!
//! # Features
//!
//! - **Typed outcomes**: rate limits, HTTP errors, connection failures and
//!   undecodable bodies are values, not errors
//! - **Rate Limiting**: optional token bucket cap using governor
//! - **Seam for tests**: the [`PageSource`] trait lets the downloader run
//!   against a scripted source

mod fetcher;
mod rate_limit;

pub use fetcher::{FetchOutcome, PageFetcher, PageSource};
pub use rate_limit::RateLimiter;
