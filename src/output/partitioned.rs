//! Hive-style partitioned Parquet writer
//!
//! Splits records by the integer values of the partition columns and writes
//! one Parquet file per distinct key under `col=value/` directories.

use super::schema::{column_names, infer_schema, json_to_arrow};
use super::writer::{write_batch_to_parquet, ParquetWriterConfig};
use crate::config::PartitionConfig;
use crate::error::{Error, Result, ResultExt};
use crate::types::{JsonObject, WriteMode};
use arrow::datatypes::{DataType, Field, Schema};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Integer values of the partition columns for one group of rows
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey(Vec<(String, i64)>);

impl PartitionKey {
    /// Column/value pairs, outermost first
    pub fn values(&self) -> &[(String, i64)] {
        &self.0
    }

    /// Directory of this partition below `root`
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        self.0.iter().fold(root.to_path_buf(), |path, (col, val)| {
            path.join(format!("{col}={val}"))
        })
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(c, v)| format!("{c}={v}")).collect();
        write!(f, "{}", parts.join("/"))
    }
}

impl Serialize for PartitionKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// One partition file produced by a write
#[derive(Debug, Clone, Serialize)]
pub struct WrittenPartition {
    pub key: PartitionKey,
    pub path: PathBuf,
    pub rows: usize,
}

/// Result of a partitioned write
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteSummary {
    /// Records handed to the writer
    pub rows_in: usize,
    /// Records that ended up in a partition file
    pub rows_written: usize,
    /// Records dropped for a null or missing partition value
    pub dropped_null: usize,
    /// Records dropped because a partition value is not an integer
    pub dropped_uncoercible: usize,
    /// Files written, ordered by key
    pub partitions: Vec<WrittenPartition>,
}

/// Writes records as a partitioned Parquet dataset
#[derive(Debug, Clone)]
pub struct PartitionedWriter {
    root: PathBuf,
    columns: Vec<String>,
    mode: WriteMode,
    parquet: ParquetWriterConfig,
}

impl PartitionedWriter {
    /// Create a writer rooted at `root`, partitioning by `columns` in order
    pub fn new(root: impl Into<PathBuf>, columns: Vec<String>) -> Self {
        Self {
            root: root.into(),
            columns,
            mode: WriteMode::default(),
            parquet: ParquetWriterConfig::default(),
        }
    }

    /// Create a writer from the partition settings
    pub fn from_config(root: impl Into<PathBuf>, config: &PartitionConfig) -> Self {
        Self::new(root, config.columns.clone())
            .with_mode(config.write_mode)
            .with_parquet(ParquetWriterConfig::new().with_compression(config.compression))
    }

    /// Set the write mode
    #[must_use]
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set Parquet file options
    #[must_use]
    pub fn with_parquet(mut self, parquet: ParquetWriterConfig) -> Self {
        self.parquet = parquet;
        self
    }

    /// Dataset root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Partition columns, outermost first
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Write `records` under the dataset root.
    ///
    /// Fails with [`Error::MissingPartitionColumns`] before touching the
    /// destination when a partition column is absent from every record.
    pub fn write(&self, records: &[JsonObject]) -> Result<WriteSummary> {
        let inferred = infer_schema(records);
        let available = column_names(&inferred);
        if self.columns.iter().any(|c| !available.contains(c)) {
            return Err(Error::MissingPartitionColumns {
                expected: self.columns.clone(),
                available,
            });
        }

        let mut summary = WriteSummary {
            rows_in: records.len(),
            ..WriteSummary::default()
        };
        let groups = self.group(records, &mut summary);

        if summary.dropped_null > 0 {
            warn!(
                rows = summary.dropped_null,
                "Dropped rows with a null partition value"
            );
        }
        if summary.dropped_uncoercible > 0 {
            warn!(
                rows = summary.dropped_uncoercible,
                "Dropped rows whose partition value is not an integer"
            );
        }
        if groups.is_empty() {
            warn!(root = %self.root.display(), "No rows left to write");
            return Ok(summary);
        }

        self.prepare_root()?;
        let schema = self.storage_schema(&inferred);
        let file_name = self.file_name();

        for (key, rows) in groups {
            let dir = key.dir_under(&self.root);
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::output(format!("Failed to create '{}': {e}", dir.display()))
            })?;

            let path = dir.join(&file_name);
            let refs: Vec<&JsonObject> = rows.iter().collect();
            let batch = json_to_arrow(&refs, &schema)?;
            let written = write_batch_to_parquet(&path, &batch, &self.parquet)?;

            debug!(partition = %key, rows = written, "Wrote partition");
            summary.rows_written += written;
            summary.partitions.push(WrittenPartition {
                key,
                path,
                rows: written,
            });
        }

        info!(
            root = %self.root.display(),
            rows = summary.rows_written,
            partitions = summary.partitions.len(),
            mode = ?self.mode,
            compression = ?self.parquet.compression(),
            "Partitioned dataset written"
        );
        Ok(summary)
    }

    /// Bucket records by partition key, replacing key values with integers
    fn group(
        &self,
        records: &[JsonObject],
        summary: &mut WriteSummary,
    ) -> BTreeMap<PartitionKey, Vec<JsonObject>> {
        let mut groups: BTreeMap<PartitionKey, Vec<JsonObject>> = BTreeMap::new();

        'records: for record in records {
            let raw: Vec<&Value> = self
                .columns
                .iter()
                .map(|c| record.get(c).unwrap_or(&Value::Null))
                .collect();
            if raw.iter().any(|v| v.is_null()) {
                summary.dropped_null += 1;
                continue;
            }

            let mut key = Vec::with_capacity(self.columns.len());
            for (column, value) in self.columns.iter().zip(raw) {
                match coerce_partition_value(value) {
                    Some(n) => key.push((column.clone(), n)),
                    None => {
                        debug!(%column, %value, "Partition value is not an integer");
                        summary.dropped_uncoercible += 1;
                        continue 'records;
                    }
                }
            }

            let mut row = record.clone();
            for (column, n) in &key {
                row.insert(column.clone(), Value::from(*n));
            }
            groups.entry(PartitionKey(key)).or_default().push(row);
        }

        groups
    }

    /// The inferred schema with partition columns pinned to non-null Int64
    fn storage_schema(&self, inferred: &Schema) -> Schema {
        let fields: Vec<Field> = inferred
            .fields()
            .iter()
            .map(|f| {
                if self.columns.contains(f.name()) {
                    Field::new(f.name(), DataType::Int64, false)
                } else {
                    Field::clone(f)
                }
            })
            .collect();
        Schema::new(fields)
    }

    /// Create the root; on rebuild, remove the previous partition tree.
    ///
    /// Only `{first column}=*` directories are removed. Anything else under
    /// the root is left alone.
    fn prepare_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            Error::output(format!("Failed to create '{}': {e}", self.root.display()))
        })?;
        if self.mode != WriteMode::Rebuild {
            return Ok(());
        }

        let Some(outer) = self.columns.first() else {
            return Ok(());
        };
        let prefix = format!("{outer}=");
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list '{}'", self.root.display()))?;

        let mut cleared = 0;
        for entry in entries {
            let path = entry?.path();
            let is_partition = path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix));
            if !is_partition {
                continue;
            }
            std::fs::remove_dir_all(&path).map_err(|e| {
                Error::output(format!("Failed to clear '{}': {e}", path.display()))
            })?;
            cleared += 1;
        }

        if cleared > 0 {
            info!(
                root = %self.root.display(),
                partitions = cleared,
                "Cleared previous partitions before rebuild"
            );
        }
        Ok(())
    }

    fn file_name(&self) -> String {
        match self.mode {
            WriteMode::Rebuild => "part-0.parquet".to_string(),
            WriteMode::Append => format!(
                "part-{}.parquet",
                chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f")
            ),
        }
    }
}

/// Coerce a partition value to an integer.
///
/// Accepts integers, floats without a fractional part, numeric strings
/// (surrounding whitespace ignored) and booleans as 0/1.
pub fn coerce_partition_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX is not exactly representable, so the upper bound is exclusive
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}
