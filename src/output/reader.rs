//! Partitioned dataset reader
//!
//! Reads a Hive-style tree back into JSON records. Partition values found in
//! `col=value` directory names fill in columns the files do not carry.

use super::schema::arrow_to_json;
use crate::error::{Error, Result, ResultExt};
use crate::types::JsonObject;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Matches a `column=value` directory name
static PARTITION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^=]+)=(.*)$").unwrap());

/// A Parquet file in the dataset with the partition values of its directory
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetFile {
    pub path: PathBuf,
    pub partition: Vec<(String, Value)>,
}

impl DatasetFile {
    /// `col=value/...` label of the containing partition
    pub fn partition_label(&self) -> String {
        self.partition
            .iter()
            .map(|(c, v)| match v {
                Value::String(s) => format!("{c}={s}"),
                other => format!("{c}={other}"),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// List every Parquet file under `root`, ordered by partition value
pub fn list_dataset_files(root: &Path) -> Result<Vec<DatasetFile>> {
    if !root.is_dir() {
        return Err(Error::output(format!(
            "Dataset directory '{}' does not exist",
            root.display()
        )));
    }

    let mut files = Vec::new();
    collect_files(root, &mut Vec::new(), &mut files)?;
    files.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    Ok(files)
}

fn collect_files(
    dir: &Path,
    partition: &mut Vec<(String, Value)>,
    out: &mut Vec<DatasetFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list '{}'", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            let segment = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let Some(caps) = PARTITION_SEGMENT.captures(segment) else {
                debug!(dir = %path.display(), "Skipping non-partition directory");
                continue;
            };
            partition.push((caps[1].to_string(), partition_value(&caps[2])));
            collect_files(&path, partition, out)?;
            partition.pop();
        } else if path.extension().is_some_and(|ext| ext == "parquet") {
            out.push(DatasetFile {
                path,
                partition: partition.clone(),
            });
        }
    }
    Ok(())
}

fn partition_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map_or_else(|_| Value::String(raw.to_string()), Value::from)
}

fn sort_key(file: &DatasetFile) -> (Vec<(Option<i64>, String)>, &Path) {
    let values = file
        .partition
        .iter()
        .map(|(_, v)| (v.as_i64(), v.to_string()))
        .collect();
    (values, file.path.as_path())
}

/// Read one Parquet file into JSON records
pub fn read_parquet_file(path: &Path) -> Result<Vec<JsonObject>> {
    let file = File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .with_context(|| format!("Failed to read '{}'", path.display()))?;

    let mut records = Vec::new();
    for batch in reader {
        records.extend(arrow_to_json(&batch?)?);
    }
    Ok(records)
}

/// Read the whole dataset under `root`.
///
/// Every column in `partition_columns` is guaranteed to be present: when a
/// file lacks it, the value is taken from the directory name.
pub fn read_dataset(root: &Path, partition_columns: &[String]) -> Result<Vec<JsonObject>> {
    let mut records = Vec::new();

    for file in list_dataset_files(root)? {
        let mut rows = read_parquet_file(&file.path)?;
        for row in &mut rows {
            restore_partition_columns(row, &file.partition, partition_columns);
        }
        debug!(file = %file.path.display(), rows = rows.len(), "Read dataset file");
        records.extend(rows);
    }

    Ok(records)
}

fn restore_partition_columns(
    row: &mut JsonObject,
    partition: &[(String, Value)],
    partition_columns: &[String],
) {
    for (column, value) in partition {
        if !partition_columns.contains(column) {
            continue;
        }
        let missing = row.get(column).map_or(true, Value::is_null);
        if missing {
            row.insert(column.clone(), value.clone());
        }
    }
}

/// Null count of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub nulls: usize,
}

/// Row count of one partition directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionCount {
    pub partition: String,
    pub rows: usize,
}

/// Shape of a partitioned dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub root: PathBuf,
    pub rows: usize,
    pub files: usize,
    pub columns: Vec<ColumnSummary>,
    pub partitions: Vec<PartitionCount>,
}

/// Summarize the dataset under `root`, leaving `drop_columns` out
pub fn summarize_dataset(
    root: &Path,
    partition_columns: &[String],
    drop_columns: &[String],
) -> Result<DatasetSummary> {
    let files = list_dataset_files(root)?;

    let mut rows = 0;
    let mut columns: Vec<ColumnSummary> = Vec::new();
    let mut partitions: Vec<PartitionCount> = Vec::new();

    for file in &files {
        let mut records = read_parquet_file(&file.path)?;
        for record in &mut records {
            restore_partition_columns(record, &file.partition, partition_columns);
        }

        let label = file.partition_label();
        match partitions.last_mut() {
            Some(last) if last.partition == label => last.rows += records.len(),
            _ => partitions.push(PartitionCount {
                partition: label,
                rows: records.len(),
            }),
        }

        for record in &records {
            for name in record.keys() {
                if !drop_columns.contains(name) && !columns.iter().any(|c| &c.name == name) {
                    columns.push(ColumnSummary {
                        name: name.clone(),
                        nulls: rows,
                    });
                }
            }
            for column in &mut columns {
                if record.get(&column.name).map_or(true, Value::is_null) {
                    column.nulls += 1;
                }
            }
            rows += 1;
        }
    }

    Ok(DatasetSummary {
        root: root.to_path_buf(),
        rows,
        files: files.len(),
        columns,
        partitions,
    })
}
