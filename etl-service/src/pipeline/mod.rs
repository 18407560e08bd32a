use std::{
    fs,
    path::{Path, PathBuf},
};

use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use parquet::{arrow::arrow_reader::ParquetRecordBatchReaderBuilder, file::reader::ChunkReader};

/// In-memory columnar table handed between pipeline stages.
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl RecordSet {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EtlError {
    #[error("fetch error: {0}")]
    Fetch(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Decode an entire parquet payload (file or in-memory bytes) into a
/// `RecordSet`.
pub fn read_parquet<R>(reader: R) -> Result<RecordSet, EtlError>
where
    R: ChunkReader + 'static,
{
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(RecordSet { schema, batches })
}

/// Sibling temp path for atomic writes (write to tmp, rename over target).
pub(crate) fn temp_sibling(target: &Path) -> Result<PathBuf, EtlError> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            EtlError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid output path `{}`", target.display()),
            ))
        })?;
    Ok(target.with_file_name(format!(".{file_name}.tmp")))
}

/// Create the parent directory chain for `target` if it is missing.
pub(crate) fn ensure_parent_dir(target: &Path) -> Result<(), EtlError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
