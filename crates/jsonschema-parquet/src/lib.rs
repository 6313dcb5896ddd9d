//! Compile JSON Schema documents into Parquet schemas and move JSON records
//! through them
//!
//! `jsonschema-parquet` turns an arbitrary JSON Schema document into a
//! Parquet-compatible schema tree and encodes JSON records into the Parquet
//! columnar format (and back) according to that tree. It wraps the Apache
//! parquet-rs crate's Arrow writers and readers.
//!
//! # Key Components
//!
//! - **Compiler**: JSON Schema to [`ParquetFieldSpec`]
//!   - Typed document model in [`json_schema`], `$ref` resolution with cycle
//!     detection in [`resolver`], type rules in [`type_mapper`]
//!   - Per-field failures become opaque placeholders plus diagnostics, unless
//!     [`SchemaCompiler::strict`] is set
//!
//! - **Tags**: The `{"Tag": ..., "Fields": [...]}` interchange format
//!   - Rendered and parsed by [`tag`]; embedded in every written file
//!
//! - **Writer**: Row-group parallel Parquet writer
//!   - Coerces JSON records field by field, rejecting mismatches with a path
//!   - Encodes row groups on a bounded rayon pool with deterministic output
//!   - Uses `std::io::Write + Send` for output flexibility
//!
//! - **Reader**: Lazy record iterator
//!   - Uses `parquet::file::reader::ChunkReader` for flexible input sources
//!   - Optional projection onto a caller-provided spec
//!
//! - **Arrow Conversion**: Bidirectional conversion between Arrow and the
//!   compiled schema/value model
//!
//! # Example Usage
//!
//! ```no_run
//! use jsonschema_parquet::{codec, compile, SchemaDocument};
//! use serde_json::json;
//!
//! let document: SchemaDocument = r#"{
//!     "type": "object",
//!     "properties": {"Name": {"type": "string"}, "Age": {"type": "integer"}},
//!     "required": ["Name"]
//! }"#.parse()?;
//! let spec = compile(&document, "root")?.into_spec();
//!
//! let bytes = codec::write_records(&[json!({"Name": "Alice", "Age": 25})], &spec, 1)?;
//! for record in codec::read_records(bytes, Some(&spec))? {
//!     println!("{}", record?);
//! }
//! # Ok::<(), jsonschema_parquet::Error>(())
//! ```

pub mod arrow_conversion;
pub mod cancel;
pub mod codec;
pub mod compiler;
pub mod error;
pub mod json_schema;
pub mod reader;
pub mod resolver;
pub mod schema;
pub mod tag;
pub mod traits;
pub mod type_mapper;
pub mod value;
pub mod writer;

pub use cancel::CancellationToken;
pub use compiler::{compile, Compilation, SchemaCompiler};
pub use error::{Diagnostic, Error, ErrorContext, Result, Severity};
pub use json_schema::{JsonSchemaNode, SchemaDocument};
pub use reader::{Reader, RecordIterator};
pub use schema::{FieldMetadata, LogicalAnnotation, ParquetFieldSpec, PhysicalType, Repetition};
pub use traits::SchemaInspector;
pub use value::ParquetValue;
pub use writer::{Writer, WriterBuilder, WriterState};
