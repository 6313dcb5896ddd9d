//! One-shot entry points over in-memory buffers
//!
//! These wrap [`Writer`] and [`Reader`] for callers that hold the whole
//! record set or the whole file in memory.

use crate::{ParquetFieldSpec, Reader, RecordIterator, Result, WriterBuilder};
use bytes::Bytes;
use serde_json::Value;

/// Encode JSON records into a complete Parquet file
///
/// `parallelism` bounds how many row groups are encoded at once; it does not
/// change the output bytes. Zero is rejected with `InvalidArgument`.
pub fn write_records(records: &[Value], spec: &ParquetFieldSpec, parallelism: usize) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .with_parallelism(parallelism)
        .build(Vec::new(), spec)?;
    writer.write_records(records)?;
    writer.close()
}

/// Encode JSON text records, one per line, into a complete Parquet file
///
/// Blank lines are skipped.
pub fn write_json_lines<'a, I>(lines: I, spec: &ParquetFieldSpec, parallelism: usize) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut writer = WriterBuilder::new()
        .with_parallelism(parallelism)
        .build(Vec::new(), spec)?;
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        writer.write_json_line(line)?;
    }
    writer.close()
}

/// Open a Parquet buffer and iterate its records lazily
///
/// OPTIONAL keys that were absent when written come back as explicit `null`.
pub fn read_records(buffer: impl Into<Bytes>, spec: Option<&ParquetFieldSpec>) -> Result<RecordIterator> {
    Reader::new(buffer.into()).read_records(spec)
}

/// Decode every record of a Parquet buffer into one JSON array
pub fn read_to_json(buffer: impl Into<Bytes>, spec: Option<&ParquetFieldSpec>) -> Result<String> {
    let records = read_records(buffer, spec)?.collect::<Result<Vec<_>>>()?;
    Ok(serde_json::to_string(&Value::Array(records))?)
}
