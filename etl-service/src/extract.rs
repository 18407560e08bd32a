use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use parquet::arrow::ArrowWriter;
use reqwest::Client;
use tracing::info;

use crate::pipeline::{ensure_parent_dir, read_parquet, temp_sibling, EtlError, RecordSet};

/// Fetch the remote parquet dataset and persist it unmodified as a local
/// columnar snapshot.
///
/// The full payload is decoded in memory, re-encoded verbatim (no column
/// changes) to `destination`, and returned. Network and decode failures are
/// fatal for the run; there is no retry.
pub async fn extract(client: &Client, url: &str, destination: &Path) -> Result<RecordSet, EtlError> {
    info!(url, "fetching source dataset");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| EtlError::Fetch(format!("request to {url} failed: {e}")))?
        .error_for_status()
        .map_err(|e| EtlError::Fetch(format!("source returned error status: {e}")))?;

    let payload = response
        .bytes()
        .await
        .map_err(|e| EtlError::Fetch(format!("reading response body from {url}: {e}")))?;

    let records = read_parquet(payload)?;
    write_snapshot(&records, destination)?;

    info!(
        rows = records.num_rows(),
        path = %destination.display(),
        "raw snapshot written"
    );

    Ok(records)
}

/// Write a `RecordSet` as a parquet file, atomically (tmp file + rename).
pub(crate) fn write_snapshot(records: &RecordSet, destination: &Path) -> Result<(), EtlError> {
    ensure_parent_dir(destination)?;
    let tmp_path = temp_sibling(destination)?;

    let tmp_file = File::create(&tmp_path)?;
    let mut writer = ArrowWriter::try_new(BufWriter::new(tmp_file), records.schema.clone(), None)?;
    for batch in &records.batches {
        writer.write(batch)?;
    }
    writer.close()?;

    fs::rename(&tmp_path, destination)?;
    Ok(())
}
