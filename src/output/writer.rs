//! Parquet file writer
//!
//! Files are written under a temporary name and renamed into place once the
//! footer is flushed, so a reader never sees a half-written partition file.

use crate::error::{Error, Result};
use crate::types::Compression as Codec;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for Parquet writer
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::GZIP(GzipLevel::default()),
            row_group_size: 1024 * 1024, // 1M rows
        }
    }
}

impl ParquetWriterConfig {
    /// Create a new config with default settings (gzip)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compression codec
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Get row group size
    #[must_use]
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Set the compression codec
    #[must_use]
    pub fn with_compression(mut self, codec: Codec) -> Self {
        self.compression = match codec {
            Codec::Gzip => Compression::GZIP(GzipLevel::default()),
            Codec::Snappy => Compression::SNAPPY,
            Codec::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Codec::Uncompressed => Compression::UNCOMPRESSED,
        };
        self
    }

    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// Parquet file writer
pub struct ParquetWriter {
    writer: ArrowWriter<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    rows_written: usize,
}

impl ParquetWriter {
    /// Create a writer that will produce `path` on [`close`](Self::close)
    pub fn new(
        path: impl AsRef<Path>,
        schema: &Schema,
        config: &ParquetWriterConfig,
    ) -> Result<Self> {
        let final_path = path.as_ref().to_path_buf();
        let temp_path = final_path.with_extension("parquet.tmp");

        let file = File::create(&temp_path).map_err(|e| {
            Error::output(format!("Failed to create '{}': {e}", temp_path.display()))
        })?;

        let writer = ArrowWriter::try_new(
            file,
            Arc::new(schema.clone()),
            Some(config.build_properties()),
        )
        .map_err(|e| Error::output(format!("Failed to create Parquet writer: {e}")))?;

        Ok(Self {
            writer,
            temp_path,
            final_path,
            rows_written: 0,
        })
    }

    /// Write a RecordBatch to the file
    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer
            .write(batch)
            .map_err(|e| Error::output(format!("Failed to write batch: {e}")))?;
        self.rows_written += batch.num_rows();
        Ok(())
    }

    /// Get the number of rows written so far
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Finish the file and move it into place
    pub fn close(self) -> Result<usize> {
        let Self {
            writer,
            temp_path,
            final_path,
            rows_written,
        } = self;

        let finished = writer
            .into_inner()
            .and_then(|file| file.sync_all().map_err(Into::into));
        if let Err(e) = finished {
            let _ = std::fs::remove_file(&temp_path);
            return Err(Error::output(format!(
                "Failed to finish '{}': {e}",
                final_path.display()
            )));
        }

        std::fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            Error::output(format!(
                "Failed to move '{}' into place: {e}",
                final_path.display()
            ))
        })?;
        Ok(rows_written)
    }
}

/// Write a single RecordBatch to a Parquet file
pub fn write_batch_to_parquet(
    path: impl AsRef<Path>,
    batch: &RecordBatch,
    config: &ParquetWriterConfig,
) -> Result<usize> {
    let mut writer = ParquetWriter::new(path, batch.schema().as_ref(), config)?;
    writer.write(batch)?;
    writer.close()
}
