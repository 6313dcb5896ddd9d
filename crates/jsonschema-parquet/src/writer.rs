//! Core Parquet writing functionality
//!
//! Records are coerced against the compiled spec as they arrive and buffered
//! into row groups of a fixed size. Full row groups are encoded into column
//! chunks on a bounded rayon pool, up to `parallelism` at a time, and a single
//! serializer appends the chunks to the file in submission order. Row group
//! boundaries depend only on the row group size and explicit flushes, so the
//! output bytes do not depend on `parallelism`.

use crate::arrow_conversion::{parquet_values_to_arrow_array, spec_to_arrow_schema};
use crate::cancel::CancellationCheck;
use crate::{tag, CancellationToken, Error, ParquetFieldSpec, ParquetValue, Result};
use arrow::record_batch::RecordBatch;
use arrow_schema::SchemaRef;
use parquet::arrow::arrow_writer::{compute_leaves, get_column_writers, ArrowColumnChunk};
use parquet::arrow::ArrowSchemaConverter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::{WriterProperties, WriterPropertiesPtr};
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::SchemaDescriptor;
use rayon::prelude::*;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;

// Default configuration constants
pub const DEFAULT_ROW_GROUP_SIZE: usize = 8192;
const DEFAULT_PARALLELISM: usize = 1;

/// File key-value metadata entry holding the tag-tree JSON of the spec
pub const SCHEMA_METADATA_KEY: &str = "jsonschema_parquet.schema";

/// Lifecycle of a [`Writer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Open with nothing buffered
    Idle,
    /// Records are buffered and not yet written
    Opened,
    /// Row groups are being encoded and appended
    Flushing,
    /// Closed, either by `close` or by a failed flush
    Closed,
}

/// Builder for creating a configured Writer
#[derive(Debug, Clone)]
pub struct WriterBuilder {
    compression: Compression,
    row_group_size: usize,
    parallelism: usize,
    cancellation: Option<CancellationToken>,
    embed_schema: bool,
}

impl Default for WriterBuilder {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            parallelism: DEFAULT_PARALLELISM,
            cancellation: None,
            embed_schema: true,
        }
    }
}

impl WriterBuilder {
    /// Create a new WriterBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression algorithm
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the number of rows per row group
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows;
        self
    }

    /// Set how many row groups may be encoded concurrently
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Observe a cancellation token between row groups
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Store the spec's tag tree in the file metadata (on by default)
    pub fn with_embedded_schema(mut self, embed: bool) -> Self {
        self.embed_schema = embed;
        self
    }

    /// Build a Writer with the configured settings
    pub fn build<W: Write + Send>(self, writer: W, spec: &ParquetFieldSpec) -> Result<Writer<W>> {
        if self.row_group_size == 0 {
            return Err(Error::invalid_argument("row group size must be at least 1"));
        }
        if self.parallelism == 0 {
            return Err(Error::invalid_argument("parallelism must be at least 1"));
        }

        let arrow_schema = spec_to_arrow_schema(spec)?;
        let parquet_schema = ArrowSchemaConverter::new().convert(&arrow_schema)?;

        let mut props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size);
        if self.embed_schema {
            props = props.set_key_value_metadata(Some(vec![KeyValue::new(
                SCHEMA_METADATA_KEY.to_string(),
                tag::to_json_string(spec)?,
            )]));
        }
        let props = Arc::new(props.build());

        let file_writer =
            SerializedFileWriter::new(writer, parquet_schema.root_schema_ptr(), props.clone())?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .thread_name(|i| format!("parquet-encode-{}", i))
            .build()
            .map_err(|e| Error::invalid_argument(format!("cannot start encoder pool: {}", e)))?;

        tracing::debug!(
            root = %spec.name,
            columns = arrow_schema.fields().len(),
            row_group_size = self.row_group_size,
            parallelism = self.parallelism,
            "opened parquet writer"
        );

        Ok(Writer {
            file_writer: Some(file_writer),
            spec: spec.clone(),
            arrow_schema,
            parquet_schema: Arc::new(parquet_schema),
            props,
            pool,
            buffered_rows: Vec::new(),
            pending_groups: Vec::new(),
            row_group_size: self.row_group_size,
            parallelism: self.parallelism,
            cancellation: self.cancellation,
            state: WriterState::Idle,
            rows_written: 0,
        })
    }
}

/// Core Parquet writer that works with any type implementing Write
pub struct Writer<W: Write + Send> {
    file_writer: Option<SerializedFileWriter<W>>,
    spec: ParquetFieldSpec,
    arrow_schema: SchemaRef,
    parquet_schema: Arc<SchemaDescriptor>,
    props: WriterPropertiesPtr,
    pool: rayon::ThreadPool,
    buffered_rows: Vec<ParquetValue>,
    /// Full row groups waiting to be encoded
    pending_groups: Vec<Vec<ParquetValue>>,
    row_group_size: usize,
    parallelism: usize,
    cancellation: Option<CancellationToken>,
    state: WriterState,
    rows_written: usize,
}

impl<W> Writer<W>
where
    W: Write + Send,
{
    /// Create a new writer with default settings
    pub fn new(writer: W, spec: &ParquetFieldSpec) -> Result<Self> {
        WriterBuilder::new().build(writer, spec)
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn spec(&self) -> &ParquetFieldSpec {
        &self.spec
    }

    /// Rows appended to the file so far (excludes buffered rows)
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Write one JSON record
    ///
    /// A record that does not fit the spec is rejected with
    /// [`Error::TypeMismatch`] and the writer stays usable.
    pub fn write_record(&mut self, record: &Value) -> Result<()> {
        self.ensure_open("write to")?;

        let row = ParquetValue::from_json(Some(record), &self.spec, &self.spec.name)?;
        self.buffered_rows.push(row);
        self.state = WriterState::Opened;

        if self.buffered_rows.len() >= self.row_group_size {
            let group = std::mem::take(&mut self.buffered_rows);
            self.pending_groups.push(group);
            if self.pending_groups.len() >= self.parallelism {
                self.write_pending_groups()?;
            }
        }

        Ok(())
    }

    /// Write a sequence of JSON records, stopping at the first rejected one
    pub fn write_records<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Parse and write one JSON text record
    pub fn write_json_line(&mut self, line: &str) -> Result<()> {
        self.ensure_open("write to")?;
        let record: Value = serde_json::from_str(line)?;
        self.write_record(&record)
    }

    /// Write all buffered records out as (possibly short) row groups
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open("flush")?;
        if !self.buffered_rows.is_empty() {
            let group = std::mem::take(&mut self.buffered_rows);
            self.pending_groups.push(group);
        }
        self.write_pending_groups()
    }

    /// Flush, write the file footer and hand back the sink
    ///
    /// Every later call fails with [`Error::UseAfterClose`].
    pub fn close(&mut self) -> Result<W> {
        self.ensure_open("close")?;
        self.flush()?;

        let result = match self.file_writer.take() {
            Some(file_writer) => file_writer.into_inner().map_err(Error::from),
            None => Err(Error::UseAfterClose("close")),
        };
        self.poison();

        if result.is_ok() {
            tracing::debug!(rows = self.rows_written, "closed parquet writer");
        }
        result
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        match self.state {
            WriterState::Closed => Err(Error::UseAfterClose(operation)),
            _ => Ok(()),
        }
    }

    /// Drop all buffered state and refuse further use
    fn poison(&mut self) {
        self.state = WriterState::Closed;
        self.file_writer = None;
        self.buffered_rows.clear();
        self.pending_groups.clear();
    }

    fn write_pending_groups(&mut self) -> Result<()> {
        if self.pending_groups.is_empty() {
            return Ok(());
        }

        self.state = WriterState::Flushing;
        match self.encode_and_append() {
            Ok(()) => {
                self.state = if self.buffered_rows.is_empty() && self.pending_groups.is_empty() {
                    WriterState::Idle
                } else {
                    WriterState::Opened
                };
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "parquet write failed; closing writer");
                self.poison();
                Err(e)
            }
        }
    }

    fn encode_and_append(&mut self) -> Result<()> {
        self.check_cancelled()?;

        let groups = std::mem::take(&mut self.pending_groups);
        let arrow_schema = &self.arrow_schema;
        let parquet_schema = &self.parquet_schema;
        let props = &self.props;

        // indexed collect keeps submission order
        let encoded: Vec<Result<(usize, Vec<ArrowColumnChunk>)>> = self.pool.install(|| {
            groups
                .into_par_iter()
                .map(|rows| encode_row_group(rows, arrow_schema, parquet_schema, props))
                .collect()
        });

        for group in encoded {
            self.check_cancelled()?;
            let (rows, chunks) = group?;

            let file_writer = self
                .file_writer
                .as_mut()
                .ok_or(Error::UseAfterClose("flush"))?;
            let mut row_group = file_writer.next_row_group()?;
            for chunk in chunks {
                chunk.append_to_row_group(&mut row_group)?;
            }
            row_group.close()?;

            self.rows_written += rows;
            tracing::debug!(rows, total = self.rows_written, "appended row group");
        }

        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}

/// Encode one row group into finished column chunks
fn encode_row_group(
    rows: Vec<ParquetValue>,
    arrow_schema: &SchemaRef,
    parquet_schema: &SchemaDescriptor,
    props: &WriterPropertiesPtr,
) -> Result<(usize, Vec<ArrowColumnChunk>)> {
    let num_rows = rows.len();
    let batch = rows_to_batch(rows, arrow_schema)?;

    let mut column_writers = get_column_writers(parquet_schema, props, arrow_schema)?;
    let mut leaf_writers = column_writers.iter_mut();
    for (field, column) in arrow_schema.fields().iter().zip(batch.columns()) {
        for leaf in compute_leaves(field, column)? {
            let writer = leaf_writers.next().ok_or_else(|| {
                Error::invalid_argument(format!("no column writer left for `{}`", field.name()))
            })?;
            writer.write(&leaf)?;
        }
    }

    let chunks = column_writers
        .into_iter()
        .map(|writer| writer.close().map_err(Error::from))
        .collect::<Result<Vec<_>>>()?;
    Ok((num_rows, chunks))
}

/// Transpose record rows into a RecordBatch
fn rows_to_batch(rows: Vec<ParquetValue>, arrow_schema: &SchemaRef) -> Result<RecordBatch> {
    let num_rows = rows.len();
    let num_cols = arrow_schema.fields().len();
    let mut columns: Vec<Vec<ParquetValue>> = vec![Vec::with_capacity(num_rows); num_cols];

    for row in rows {
        let mut fields = match row {
            ParquetValue::Record(fields) => fields,
            other => {
                return Err(Error::invalid_argument(format!(
                    "top-level row must be a record, got {}",
                    other.type_name()
                )))
            }
        };
        for (column, field) in columns.iter_mut().zip(arrow_schema.fields()) {
            column.push(
                fields
                    .shift_remove(field.name().as_str())
                    .unwrap_or(ParquetValue::Null),
            );
        }
    }

    let arrow_columns = columns
        .into_iter()
        .zip(arrow_schema.fields())
        .map(|(values, field)| parquet_values_to_arrow_array(values, field))
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new(arrow_schema.clone(), arrow_columns)?)
}
