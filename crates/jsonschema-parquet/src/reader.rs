//! Core Parquet reading functionality
//!
//! Records are decoded lazily, one row at a time, from Arrow record batches.
//! The shape of the output comes from a compiled spec: the one the caller
//! passes, else the tag tree embedded by the writer, else a spec derived from
//! the file's Arrow schema.

use crate::arrow_conversion::{arrow_to_parquet_value, spec_from_arrow_field, spec_from_arrow_schema};
use crate::error::ErrorContext;
use crate::schema::PhysicalType;
use crate::traits::SchemaInspector;
use crate::writer::SCHEMA_METADATA_KEY;
use crate::cancel::CancellationCheck;
use crate::{tag, CancellationToken, Error, ParquetFieldSpec, Result};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use parquet::file::metadata::{FileMetaData, ParquetMetaData};
use parquet::file::reader::ChunkReader;
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};

/// Root name used for specs derived from a file without an embedded schema
pub const DERIVED_ROOT_NAME: &str = "root";

const DEFAULT_BATCH_SIZE: usize = 1024;

/// Core Parquet reader that works with any source implementing ChunkReader
#[derive(Clone)]
pub struct Reader<R> {
    inner: R,
    batch_size: usize,
    cancellation: Option<CancellationToken>,
}

impl<R> Reader<R>
where
    R: ChunkReader + Clone + 'static,
{
    /// Create a new reader
    pub fn new(reader: R) -> Self {
        Self {
            inner: reader,
            batch_size: DEFAULT_BATCH_SIZE,
            cancellation: None,
        }
    }

    /// Set how many rows are decoded per Arrow batch
    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows.max(1);
        self
    }

    /// Observe a cancellation token between rows
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Get the Parquet file metadata
    pub fn metadata(&self) -> Result<FileMetaData> {
        let builder = open(self.inner.clone())?;
        Ok(builder.metadata().file_metadata().clone())
    }

    /// The spec embedded by the writer, if the file carries one
    pub fn embedded_schema(&self) -> Result<Option<ParquetFieldSpec>> {
        let builder = open(self.inner.clone())?;
        embedded_schema(builder.metadata())
    }

    /// The spec records are shaped by when none is given to [`Reader::read_records`]
    pub fn schema(&self) -> Result<ParquetFieldSpec> {
        let builder = open(self.inner.clone())?;
        file_schema(&builder)
    }

    /// Read records from the Parquet data
    ///
    /// With a spec, only the spec's top-level columns are decoded and every
    /// one of them must exist in the file with the same physical type.
    /// Every field of the spec appears in each record; OPTIONAL keys that
    /// were absent when written come back as explicit `null`.
    pub fn read_records(self, spec: Option<&ParquetFieldSpec>) -> Result<RecordIterator> {
        let mut builder = open(self.inner)?.with_batch_size(self.batch_size);

        let spec = match spec {
            Some(spec) => {
                let indices = projection(&builder, spec)?;
                let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
                builder = builder.with_projection(mask);
                spec.clone()
            }
            None => file_schema(&builder)?,
        };

        let total_rows = builder.metadata().file_metadata().num_rows();
        let batch_reader = builder.build().corrupt("cannot decode parquet data")?;

        tracing::debug!(
            root = %spec.name,
            columns = spec.children.len(),
            rows = total_rows,
            "opened parquet reader"
        );

        Ok(RecordIterator {
            batch_reader,
            spec,
            current_batch: None,
            column_indices: Vec::new(),
            current_row: 0,
            rows_read: 0,
            cancellation: self.cancellation,
            finished: false,
        })
    }
}

fn open<R: ChunkReader + 'static>(reader: R) -> Result<ParquetRecordBatchReaderBuilder<R>> {
    guard_decode(|| Ok(ParquetRecordBatchReaderBuilder::try_new(reader)))?
        .corrupt("cannot open parquet data")
}

fn embedded_schema(metadata: &ParquetMetaData) -> Result<Option<ParquetFieldSpec>> {
    let Some(entries) = metadata.file_metadata().key_value_metadata() else {
        return Ok(None);
    };
    let Some(text) = entries
        .iter()
        .find(|kv| kv.key == SCHEMA_METADATA_KEY)
        .and_then(|kv| kv.value.as_deref())
    else {
        return Ok(None);
    };
    tag::from_json_str(text)
        .corrupt("embedded schema is malformed")
        .map(Some)
}

fn file_schema<R: ChunkReader + 'static>(
    builder: &ParquetRecordBatchReaderBuilder<R>,
) -> Result<ParquetFieldSpec> {
    match embedded_schema(builder.metadata())? {
        Some(spec) => Ok(spec),
        None => spec_from_arrow_schema(builder.schema(), DERIVED_ROOT_NAME),
    }
}

/// Root column indices for the top-level fields of `spec`
fn projection<R: ChunkReader + 'static>(
    builder: &ParquetRecordBatchReaderBuilder<R>,
    spec: &ParquetFieldSpec,
) -> Result<Vec<usize>> {
    if spec.physical_type != PhysicalType::Group {
        return Err(Error::invalid_argument(format!(
            "root field `{}` must be a GROUP to read rows, found {}",
            spec.name, spec.physical_type
        )));
    }

    let file = builder.schema();
    let mut indices = Vec::with_capacity(spec.children.len());
    for child in &spec.children {
        let path = format!("{}.{}", spec.name, child.json_key());
        let Ok(index) = file.index_of(&child.name) else {
            return Err(Error::type_mismatch(
                path,
                format!("column `{}`", child.name),
                "no such column in file",
            ));
        };

        let stored = spec_from_arrow_field(file.field(index), &spec.name)?;
        if stored.physical_type != child.physical_type {
            return Err(Error::type_mismatch(
                path,
                child.physical_type.to_string(),
                stored.physical_type.to_string(),
            ));
        }
        indices.push(index);
    }

    tracing::debug!(
        columns = indices.len(),
        available = file.fields().len(),
        fields = spec.field_count(),
        "projected parquet columns"
    );
    Ok(indices)
}

/// Iterator over JSON records in a Parquet file
///
/// Finite and not restartable. After the first error it yields nothing more.
pub struct RecordIterator {
    batch_reader: ParquetRecordBatchReader,
    spec: ParquetFieldSpec,
    current_batch: Option<RecordBatch>,
    /// Batch column of each top-level spec field
    column_indices: Vec<usize>,
    current_row: usize,
    rows_read: usize,
    cancellation: Option<CancellationToken>,
    finished: bool,
}

impl RecordIterator {
    /// The spec the records are shaped by
    pub fn spec(&self) -> &ParquetFieldSpec {
        &self.spec
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn next_record(&mut self) -> Option<Result<Value>> {
        loop {
            if let Some(batch) = &self.current_batch {
                if self.current_row < batch.num_rows() {
                    if let Some(Err(e)) = self.cancellation.as_ref().map(|t| t.check()) {
                        return Some(Err(e));
                    }

                    let (indices, spec, row) = (&self.column_indices, &self.spec, self.current_row);
                    let record = guard_decode(|| row_to_json(batch, indices, spec, row))
                        .with_corrupt(|| format!("decoding row {}", self.rows_read));
                    self.current_row += 1;
                    self.rows_read += 1;
                    return Some(record);
                }
            }

            // Need to fetch next batch
            let batch_reader = &mut self.batch_reader;
            let fetched = match guard_decode(|| Ok(batch_reader.next())) {
                Ok(fetched) => fetched,
                Err(e) => {
                    return Some(Err::<Value, _>(e).with_corrupt(|| {
                        format!("decoding row group data after row {}", self.rows_read)
                    }))
                }
            };
            match fetched {
                Some(Ok(batch)) => {
                    self.column_indices = match column_indices(&batch, &self.spec) {
                        Ok(indices) => indices,
                        Err(e) => return Some(Err(e)),
                    };
                    self.current_batch = Some(batch);
                    self.current_row = 0;
                }
                Some(Err(e)) => {
                    return Some(Err::<Value, _>(e).with_corrupt(|| {
                        format!("decoding row group data after row {}", self.rows_read)
                    }))
                }
                None => return None,
            }
        }
    }
}

impl Iterator for RecordIterator {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let next = self.next_record();
        if !matches!(next, Some(Ok(_))) {
            self.finished = true;
        }
        next
    }
}

impl std::iter::FusedIterator for RecordIterator {}

/// Run a decoding step, turning a panic inside the parquet decoder into an error
///
/// Some malformed pages trip index checks in the decoder instead of
/// returning an error.
fn guard_decode<T>(decode: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(decode)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "decoder panicked".to_string());
        Err(Error::corrupt_data(message))
    })
}

fn column_indices(batch: &RecordBatch, spec: &ParquetFieldSpec) -> Result<Vec<usize>> {
    let schema = batch.schema();
    spec.children
        .iter()
        .map(|child| {
            schema.index_of(&child.name).map_err(|_| {
                Error::corrupt_data(format!("decoded batch has no column `{}`", child.name))
            })
        })
        .collect()
}

fn row_to_json(
    batch: &RecordBatch,
    column_indices: &[usize],
    spec: &ParquetFieldSpec,
    row: usize,
) -> Result<Value> {
    let mut record = Map::with_capacity(spec.children.len());
    for (child, &index) in spec.children.iter().zip(column_indices) {
        let value = arrow_to_parquet_value(batch.column(index), row)?;
        record.insert(child.json_key().to_string(), value.to_json(child));
    }
    Ok(Value::Object(record))
}
