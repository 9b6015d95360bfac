//! Raw store module
//!
//! One pretty-printed JSON document per downloaded page, at a path derived
//! from the page number. Documents are written once, atomically, and never
//! rewritten by the downloader.
//!
//! # Overview
//!
//! - `RawStore` - existence checks, atomic writes, ordered listing, reads
//! - `StoredDocument` - a listed document and the page it belongs to

mod raw;

pub use raw::{RawStore, StoredDocument};

#[cfg(test)]
mod tests;
