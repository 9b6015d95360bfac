//! Output module
//!
//! Turns aggregated records into the partitioned Parquet dataset and reads
//! it back.
//!
//! # Overview
//!
//! - Inferring Arrow schemas from JSON records
//! - Converting between JSON records and Arrow RecordBatches
//! - Writing one gzip Parquet file per `col=value/` partition
//! - Reading and summarizing a partitioned dataset

mod partitioned;
mod reader;
mod schema;
mod writer;

pub use partitioned::{
    coerce_partition_value, PartitionKey, PartitionedWriter, WriteSummary, WrittenPartition,
};
pub use reader::{
    list_dataset_files, read_dataset, read_parquet_file, summarize_dataset, ColumnSummary,
    DatasetFile, DatasetSummary, PartitionCount,
};
pub use schema::{arrow_to_json, column_names, infer_schema, json_to_arrow};
pub use writer::{write_batch_to_parquet, ParquetWriter, ParquetWriterConfig};

#[cfg(test)]
mod tests;
