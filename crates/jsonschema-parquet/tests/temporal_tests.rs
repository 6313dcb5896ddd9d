use jsonschema_parquet::*;
use serde_json::{json, Value};

use test_helpers::*;

fn dated_schema() -> ParquetFieldSpec {
    compile_schema(json!({
        "type": "object",
        "properties": {
            "day": {"type": "string", "format": "date"},
            "at": {"type": ["string", "null"], "format": "date-time"},
            "free": {"type": "string", "format": "email"}
        },
        "required": ["day"]
    }))
}

#[test]
fn test_date_fields_compile_to_annotated_text() {
    let spec = dated_schema();

    let day = spec.child("day").unwrap();
    assert_eq!(day.physical_type, PhysicalType::ByteArray);
    assert_eq!(day.logical, Some(LogicalAnnotation::Date));
    assert_eq!(day.repetition, Repetition::Required);

    let at = spec.child("at").unwrap();
    assert_eq!(at.logical, Some(LogicalAnnotation::DateTime));
    assert_eq!(at.repetition, Repetition::Optional);

    // unknown formats are plain text
    assert_eq!(spec.child("free").unwrap().logical, Some(LogicalAnnotation::Utf8));
}

#[test]
fn test_valid_dates_roundtrip_unchanged() {
    let records = vec![
        json!({"day": "2024-02-29", "at": "2024-02-29T23:59:59.999Z", "free": "a@b.c"}),
        json!({"day": "0001-01-01", "at": "2000-01-01T00:00:00-08:00", "free": "x"}),
        json!({"day": "9999-12-31", "at": null, "free": null}),
    ];
    test_roundtrip(records, dated_schema()).unwrap();
}

#[test]
fn test_invalid_dates_are_rejected() {
    let spec = dated_schema();
    let mut writer = Writer::new(Vec::new(), &spec).unwrap();

    for (record, path) in [
        (json!({"day": "2023-02-29"}), "root.day"),
        (json!({"day": "29/02/2024"}), "root.day"),
        (json!({"day": 20240229}), "root.day"),
        (json!({"day": "2024-01-01", "at": "2024-01-01"}), "root.at"),
        (json!({"day": "2024-01-01", "at": "2024-01-01T10:00:00"}), "root.at"),
    ] {
        let err = writer.write_record(&record).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{}", record);
        assert_eq!(err.field_path(), Some(path), "{}", record);
    }

    // nothing was buffered
    assert_eq!(writer.state(), WriterState::Idle);
    let read_back: Vec<Value> = read_all(writer.close().unwrap(), None).unwrap();
    assert!(read_back.is_empty());
}

#[test]
fn test_date_format_survives_the_tag_tree() {
    let spec = dated_schema();
    let bytes = codec::write_records(&[json!({"day": "2020-01-01"})], &spec, 1).unwrap();

    let embedded = Reader::new(bytes::Bytes::from(bytes))
        .embedded_schema()
        .unwrap()
        .unwrap();
    assert_eq!(
        embedded.child("day").unwrap().logical,
        Some(LogicalAnnotation::Date)
    );
    assert_eq!(
        embedded.child("at").unwrap().logical,
        Some(LogicalAnnotation::DateTime)
    );
}
