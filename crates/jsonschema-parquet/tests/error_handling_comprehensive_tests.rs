use arrow_array::{Date32Array, Int32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use jsonschema_parquet::*;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;
use std::sync::Arc;

use test_helpers::*;

/// Write a batch with the stock Arrow writer instead of ours
fn foreign_file(batch: RecordBatch, metadata: Option<Vec<KeyValue>>) -> Vec<u8> {
    let props = WriterProperties::builder()
        .set_key_value_metadata(metadata)
        .build();
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buffer
}

fn people_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("name", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int32Array::from(vec![1, 2])),
            Arc::new(StringArray::from(vec![Some("a"), None])),
        ],
    )
    .unwrap()
}

// =============================================================================
// Corrupt Input
// =============================================================================

#[test]
fn test_garbage_buffer_is_corrupt() {
    let err = codec::read_records(vec![0xAB_u8; 256], None).err().unwrap();
    assert!(matches!(err, Error::CorruptData(_)), "got {:?}", err);
}

#[test]
fn test_empty_buffer_is_corrupt() {
    let err = codec::read_records(Vec::new(), None).err().unwrap();
    assert!(matches!(err, Error::CorruptData(_)));
}

#[test]
fn test_truncated_buffer_is_corrupt() {
    let bytes = codec::write_records(&generate_test_records(100), &create_test_schema(), 1).unwrap();

    for cut in [4, bytes.len() / 2, bytes.len() - 1] {
        let err = codec::read_records(bytes[..cut].to_vec(), None).err().unwrap();
        assert!(
            matches!(err, Error::CorruptData(_)),
            "cut at {} gave {:?}",
            cut,
            err
        );
    }
}

#[test]
fn test_flipped_bytes_never_escape_as_panics() {
    let spec = create_test_schema();
    let builder = WriterBuilder::new().with_compression(Compression::UNCOMPRESSED);
    let original = write_with(builder, &generate_test_records(2000), &spec).unwrap();

    // xorshift, so every run flips the same bytes
    let mut state = 0x9E37_79B9_7F4A_7C15_u64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for trial in 0..200 {
        let mut bytes = original.clone();
        for _ in 0..8 {
            let at = (next() % bytes.len() as u64) as usize;
            bytes[at] ^= (next() % 255 + 1) as u8;
        }

        let outcome = codec::read_records(bytes, None).and_then(|records| {
            records.collect::<Result<Vec<_>>>()
        });
        if let Err(err) = outcome {
            assert!(
                matches!(err, Error::CorruptData(_)),
                "trial {} gave {:?}",
                trial,
                err
            );
        }
    }
}

#[test]
fn test_corrupt_metadata_fails_reader_accessors() {
    let reader = Reader::new(Bytes::from_static(b"PAR1 not really parquet PAR1"));
    assert!(matches!(reader.metadata(), Err(Error::CorruptData(_))));
    assert!(matches!(reader.schema(), Err(Error::CorruptData(_))));
    assert!(matches!(reader.embedded_schema(), Err(Error::CorruptData(_))));
}

#[test]
fn test_malformed_embedded_schema_is_corrupt() {
    let bytes = foreign_file(
        people_batch(),
        Some(vec![KeyValue::new(
            writer::SCHEMA_METADATA_KEY.to_string(),
            "{\"Tag\": ".to_string(),
        )]),
    );

    let err = codec::read_records(bytes.clone(), None).err().unwrap();
    assert!(matches!(err, Error::CorruptData(_)));

    // an explicit spec does not need the embedded one
    let spec = compile_schema(json!({
        "type": "object",
        "properties": {"name": {"type": "string"}}
    }));
    assert_eq!(
        read_all(bytes, Some(&spec)).unwrap(),
        vec![json!({"name": "a"}), json!({"name": null})]
    );
}

// =============================================================================
// Files From Other Writers
// =============================================================================

#[test]
fn test_foreign_file_derives_schema() {
    let bytes = foreign_file(people_batch(), None);

    let reader = Reader::new(Bytes::from(bytes.clone()));
    let spec = reader.schema().unwrap();
    assert_eq!(spec.child("id").unwrap().physical_type, PhysicalType::Int32);
    assert_eq!(spec.child("id").unwrap().repetition, Repetition::Required);
    assert_eq!(spec.child("name").unwrap().repetition, Repetition::Optional);

    assert_eq!(
        read_all(bytes, None).unwrap(),
        vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": null})]
    );
}

#[test]
fn test_foreign_column_without_json_mapping() {
    let schema = Arc::new(Schema::new(vec![Field::new("day", DataType::Date32, false)]));
    let batch =
        RecordBatch::try_new(schema, vec![Arc::new(Date32Array::from(vec![19000]))]).unwrap();
    let bytes = foreign_file(batch, None);

    let err = codec::read_records(bytes, None).err().unwrap();
    match err {
        Error::UnsupportedType { path, .. } => assert_eq!(path, "root.day"),
        other => panic!("expected an unsupported type, got {:?}", other),
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancelled_read_stops_the_iterator() {
    let bytes = codec::write_records(&generate_test_records(20), &create_test_schema(), 1).unwrap();
    let token = CancellationToken::new();

    let mut records = Reader::new(Bytes::from(bytes))
        .with_cancellation(token.clone())
        .read_records(None)
        .unwrap();

    assert!(records.next().unwrap().is_ok());
    assert!(records.next().unwrap().is_ok());

    token.cancel();
    assert!(matches!(records.next(), Some(Err(Error::Cancelled))));
    assert!(records.next().is_none());
    assert_eq!(records.rows_read(), 2);
}

#[test]
fn test_cancelled_before_writing() {
    let token = CancellationToken::new();
    token.cancel();

    let mut writer = WriterBuilder::new()
        .with_cancellation(token)
        .build(Vec::new(), &create_test_schema())
        .unwrap();
    writer.write_records(&generate_test_records(5)).unwrap();
    assert!(matches!(writer.close(), Err(Error::Cancelled)));
}

// =============================================================================
// Error Reporting
// =============================================================================

#[test]
fn test_error_messages_carry_paths() {
    let err = Error::type_mismatch("root.Age", "INT64", "string");
    assert_eq!(
        err.to_string(),
        "Type mismatch at `root.Age`: expected INT64, got string"
    );
    assert_eq!(err.field_path(), Some("root.Age"));

    let err = Error::UseAfterClose("write to");
    assert_eq!(err.to_string(), "Use after close: cannot write to a closed writer");
    assert_eq!(err.field_path(), None);
}
