//! Record aggregator module
//!
//! Reads every raw document and concatenates the records found under the
//! results field into one in-memory collection.
//!
//! Unreadable or non-JSON documents are skipped with a warning; documents
//! without a results list are skipped silently. The collection is returned
//! only once all documents are processed, since the tabular conversion
//! downstream needs the full set of columns.

use crate::error::Result;
use crate::progress;
use crate::store::{RawStore, StoredDocument};
use crate::types::JsonObject;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Records gathered from the raw store, plus bookkeeping
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregation {
    /// All records, in document order
    #[serde(skip)]
    pub records: Vec<JsonObject>,
    /// Documents that contributed a results list (possibly empty)
    pub documents_read: usize,
    /// Documents skipped because they could not be read or parsed
    pub documents_invalid: usize,
    /// Documents without a results list
    pub documents_without_results: usize,
    /// List items skipped because they were not JSON objects
    pub non_object_items: usize,
}

impl Aggregation {
    /// Number of records collected
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was collected; the pipeline stops here when true
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What a single document yields
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// The results list, with non-object items removed
    Records {
        records: Vec<JsonObject>,
        non_objects: usize,
    },
    /// No results field, or it is not a list
    NoResults,
}

/// Collects records from raw documents
#[derive(Debug, Clone)]
pub struct RecordAggregator {
    /// Dot-separated path of the results list inside a document
    results_field: String,
}

impl Default for RecordAggregator {
    fn default() -> Self {
        Self::new("results")
    }
}

impl RecordAggregator {
    /// Create an aggregator reading the list at `results_field`
    pub fn new(results_field: impl Into<String>) -> Self {
        Self {
            results_field: results_field.into(),
        }
    }

    /// Read every document in `store` and concatenate their records.
    ///
    /// Only a failure to list the store directory is an error.
    pub async fn aggregate(&self, store: &RawStore) -> Result<Aggregation> {
        let documents = store.list_all().await?;
        info!(
            documents = documents.len(),
            dir = %store.dir().display(),
            "Aggregating raw documents"
        );

        let progress = progress::bar("aggregate", documents.len() as u64);
        let mut aggregation = Aggregation::default();
        for document in &documents {
            progress.set_message(document.name());
            self.absorb(store, document, &mut aggregation).await;
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(
            records = aggregation.len(),
            read = aggregation.documents_read,
            invalid = aggregation.documents_invalid,
            without_results = aggregation.documents_without_results,
            "Aggregation finished"
        );
        Ok(aggregation)
    }

    async fn absorb(&self, store: &RawStore, document: &StoredDocument, into: &mut Aggregation) {
        let text = match store.read(document).await {
            Ok(text) => text,
            Err(e) => {
                warn!(document = %document.name(), error = %e, "Skipping unreadable document");
                into.documents_invalid += 1;
                return;
            }
        };

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(document = %document.name(), error = %e, "Skipping document that is not JSON");
                into.documents_invalid += 1;
                return;
            }
        };

        match self.extract(&value) {
            Extracted::Records {
                records,
                non_objects,
            } => {
                debug!(document = %document.name(), records = records.len(), "Read document");
                if non_objects > 0 {
                    warn!(
                        document = %document.name(),
                        skipped = non_objects,
                        "Skipping results items that are not objects"
                    );
                }
                into.documents_read += 1;
                into.non_object_items += non_objects;
                into.records.extend(records);
            }
            Extracted::NoResults => {
                into.documents_without_results += 1;
            }
        }
    }

    /// Pull the records out of one parsed document
    pub fn extract(&self, value: &Value) -> Extracted {
        match extract_simple_path(value, &self.results_field) {
            Some(Value::Array(items)) => {
                let mut records = Vec::with_capacity(items.len());
                let mut non_objects = 0;
                for item in items {
                    match item {
                        Value::Object(obj) => records.push(obj.clone()),
                        _ => non_objects += 1,
                    }
                }
                Extracted::Records {
                    records,
                    non_objects,
                }
            }
            _ => Extracted::NoResults,
        }
    }
}

/// Follow a dot-separated path through nested objects
fn extract_simple_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
}
