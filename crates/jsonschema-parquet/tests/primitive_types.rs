use jsonschema_parquet::*;
use serde_json::{json, Value};

use test_helpers::*;

fn single(property: Value) -> ParquetFieldSpec {
    compile_schema(json!({
        "type": "object",
        "properties": {"v": property},
        "required": ["v"]
    }))
}

fn write_one(spec: &ParquetFieldSpec, value: Value) -> Result<Value> {
    let bytes = codec::write_records(&[json!({"v": value})], spec, 1)?;
    let mut records = read_all(bytes, None)?;
    Ok(records.remove(0)["v"].take())
}

#[test]
fn test_type_mapping_table() {
    let cases = [
        (json!({"type": "string"}), PhysicalType::ByteArray),
        (json!({"type": "integer"}), PhysicalType::Int64),
        (json!({"type": "number"}), PhysicalType::Double),
        (json!({"type": "number", "format": "float"}), PhysicalType::Float),
        (json!({"type": "boolean"}), PhysicalType::Boolean),
        (json!({"type": "array", "items": {"type": "string"}}), PhysicalType::List),
        (json!({"type": "object", "properties": {"x": {"type": "string"}}}), PhysicalType::Group),
        (json!({"type": "object", "additionalProperties": {"type": "string"}}), PhysicalType::Map),
    ];

    for (property, expected) in cases {
        let spec = single(property.clone());
        assert_eq!(spec.children[0].physical_type, expected, "{}", property);
    }
}

#[test]
fn test_int64_boundaries() {
    let spec = single(json!({"type": "integer"}));

    assert_eq!(write_one(&spec, json!(i64::MAX)).unwrap(), json!(i64::MAX));
    assert_eq!(write_one(&spec, json!(i64::MIN)).unwrap(), json!(i64::MIN));
    assert_eq!(write_one(&spec, json!(0)).unwrap(), json!(0));

    let err = write_one(&spec, json!(u64::MAX)).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
    let err = write_one(&spec, json!(1e300)).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn test_integer_rejects_other_kinds() {
    let spec = single(json!({"type": "integer"}));
    for value in [json!("12"), json!(true), json!([1]), json!({"n": 1})] {
        let err = write_one(&spec, value.clone()).unwrap_err();
        assert_eq!(err.field_path(), Some("root.v"), "{}", value);
    }
}

#[test]
fn test_numbers_accept_integers() {
    let double = single(json!({"type": "number"}));
    assert_eq!(write_one(&double, json!(3)).unwrap(), json!(3.0));
    assert_eq!(write_one(&double, json!(-0.125)).unwrap(), json!(-0.125));

    let float = single(json!({"type": "number", "format": "float"}));
    assert_eq!(write_one(&float, json!(0.3)).unwrap(), json!(0.3));
    assert!(matches!(
        write_one(&float, json!("0.3")),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_float_rejects_values_beyond_its_range() {
    let spec = single(json!({"type": "number", "format": "float"}));

    for value in [json!(1e300), json!(-3.5e38)] {
        let err = write_one(&spec, value.clone()).unwrap_err();
        match err {
            Error::TypeMismatch { path, expected, .. } => {
                assert_eq!(path, "root.v");
                assert_eq!(expected, "FLOAT in range");
            }
            other => panic!("expected TypeMismatch for {}, got {:?}", value, other),
        }
    }

    assert!(write_one(&spec, json!(f32::MAX as f64)).unwrap().is_number());
    assert_eq!(write_one(&spec, json!(1e-50)).unwrap(), json!(0.0));
}

#[test]
fn test_booleans_are_strict() {
    let spec = single(json!({"type": "boolean"}));
    assert_eq!(write_one(&spec, json!(false)).unwrap(), json!(false));
    assert!(matches!(
        write_one(&spec, json!(0)),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        write_one(&spec, json!("true")),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_strings_are_strict_unless_opaque() {
    let spec = single(json!({"type": "string"}));
    assert_eq!(write_one(&spec, json!("ünïcödé ✓")).unwrap(), json!("ünïcödé ✓"));
    assert!(matches!(
        write_one(&spec, json!(5)),
        Err(Error::TypeMismatch { .. })
    ));

    let opaque = single(json!({"type": "uuid"}));
    assert!(opaque.children[0].metadata.opaque);
    assert_eq!(write_one(&opaque, json!(5)).unwrap(), json!("5"));
    assert_eq!(
        write_one(&opaque, json!({"a": [true]})).unwrap(),
        json!("{\"a\":[true]}")
    );
    // still REQUIRED: null is not a value
    assert!(matches!(
        write_one(&opaque, Value::Null),
        Err(Error::TypeMismatch { .. })
    ));
}
