//! CSV encoding of the pipeline's tables.

use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use std::path::Path;

/// Serializes rows with a header taken from the row type's field names.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

/// Writes `fields` of each record, in that order, under a header row.
pub fn records_to_csv(records: &[Record], fields: &[&str]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields)?;
    for record in records {
        writer.write_record(fields.iter().map(|f| record.get(f)))?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

/// Reads a headed CSV into records, every value kept as text.
pub fn read_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.trim(), v.trim()))
            .collect();
        records.push(record);
    }
    Ok(records)
}

pub fn read_records_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Record>> {
    let bytes = std::fs::read(path.as_ref())?;
    let records = read_records(&bytes)?;
    tracing::debug!("Read {} rows from {}", records.len(), path.as_ref().display());
    Ok(records)
}
