use arrow_array::*;
use arrow_schema::{DataType, Field};
use indexmap::IndexMap;
use jsonschema_parquet::arrow_conversion::{
    arrow_to_parquet_value, parquet_values_to_arrow_array, spec_from_arrow_schema,
    spec_to_arrow_schema,
};
use jsonschema_parquet::*;
use ordered_float::OrderedFloat;
use serde_json::json;
use std::sync::Arc;

use test_helpers::*;

#[test]
fn test_compiled_schema_to_arrow() {
    let spec = compile_schema(json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "ratio": {"type": "number", "format": "float"},
            "tags": {"type": "array", "items": {"type": "string"}},
            "counts": {"type": "object", "additionalProperties": {"type": "integer"}},
            "owner": {"type": "object", "properties": {"name": {"type": "string"}}}
        },
        "required": ["id"]
    }));

    let schema = spec_to_arrow_schema(&spec).unwrap();
    assert_eq!(schema.fields().len(), 5);

    let id = schema.field_with_name("id").unwrap();
    assert_eq!(id.data_type(), &DataType::Int64);
    assert!(!id.is_nullable());

    assert_eq!(
        schema.field_with_name("ratio").unwrap().data_type(),
        &DataType::Float32
    );

    match schema.field_with_name("tags").unwrap().data_type() {
        DataType::List(item) => {
            assert_eq!(item.name(), "element");
            assert_eq!(item.data_type(), &DataType::Utf8);
            assert!(!item.is_nullable());
        }
        other => panic!("expected a list, got {:?}", other),
    }

    match schema.field_with_name("counts").unwrap().data_type() {
        DataType::Map(entries, sorted) => {
            assert!(!sorted);
            assert_eq!(entries.name(), "key_value");
            match entries.data_type() {
                DataType::Struct(kv) => {
                    assert_eq!(kv[0].name(), "key");
                    assert!(!kv[0].is_nullable());
                    assert_eq!(kv[1].name(), "value");
                    assert_eq!(kv[1].data_type(), &DataType::Int64);
                }
                other => panic!("expected entries struct, got {:?}", other),
            }
        }
        other => panic!("expected a map, got {:?}", other),
    }

    assert!(matches!(
        schema.field_with_name("owner").unwrap().data_type(),
        DataType::Struct(fields) if fields.len() == 1
    ));
}

#[test]
fn test_arrow_schema_back_to_spec() {
    let spec = compile_schema(json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "tags": {"type": "array", "items": {"type": ["string", "null"]}},
            "counts": {"type": "object", "additionalProperties": {"type": "boolean"}},
            "owner": {"type": "object", "properties": {"age": {"type": "integer"}}}
        },
        "required": ["id", "owner"]
    }));

    let schema = spec_to_arrow_schema(&spec).unwrap();
    let derived = spec_from_arrow_schema(&schema, "root").unwrap();

    // the derived tree has the same shape, only the converted types differ
    assert_eq!(derived.all_field_paths(), spec.all_field_paths());
    for path in spec.all_field_paths() {
        let original = spec.get_field_by_path(&path).unwrap();
        let back = derived.get_field_by_path(&path).unwrap();
        assert_eq!(original.physical_type, back.physical_type, "{}", path);
        assert_eq!(original.repetition, back.repetition, "{}", path);
    }
}

#[test]
fn test_leaf_root_is_not_a_table() {
    let spec = ParquetFieldSpec::leaf("n", PhysicalType::Int64, Repetition::Required);
    assert!(matches!(
        spec_to_arrow_schema(&spec),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_primitive_arrays_roundtrip() {
    let values = vec![
        ParquetValue::Float32(OrderedFloat(1.0f32)),
        ParquetValue::Float32(OrderedFloat(-2.5f32)),
        ParquetValue::Null,
    ];
    let field = Field::new("f", DataType::Float32, true);
    let array = parquet_values_to_arrow_array(values.clone(), &field).unwrap();
    assert_eq!(array.len(), 3);
    let floats = array.as_any().downcast_ref::<Float32Array>().unwrap();
    assert_eq!(floats.value(1), -2.5);
    assert!(floats.is_null(2));

    for (i, expected) in values.iter().enumerate() {
        assert_eq!(&arrow_to_parquet_value(array.as_ref(), i).unwrap(), expected);
    }

    // Int32 values widen into an Int64 column
    let field = Field::new("i", DataType::Int64, false);
    let array = parquet_values_to_arrow_array(vec![ParquetValue::Int32(7)], &field).unwrap();
    assert_eq!(
        arrow_to_parquet_value(array.as_ref(), 0).unwrap(),
        ParquetValue::Int64(7)
    );
}

#[test]
fn test_nested_arrays_roundtrip() {
    let item = Arc::new(Field::new("element", DataType::Int64, false));
    let field = Field::new("list", DataType::List(item), true);
    let values = vec![
        ParquetValue::List(vec![ParquetValue::Int64(1), ParquetValue::Int64(2)]),
        ParquetValue::Null,
        ParquetValue::List(vec![]),
    ];

    let array = parquet_values_to_arrow_array(values.clone(), &field).unwrap();
    let list = array.as_any().downcast_ref::<ListArray>().unwrap();
    assert_eq!(list.len(), 3);
    assert!(list.is_null(1));
    for (i, expected) in values.iter().enumerate() {
        assert_eq!(&arrow_to_parquet_value(array.as_ref(), i).unwrap(), expected);
    }

    let mut fields = IndexMap::new();
    fields.insert(Arc::from("x"), ParquetValue::Boolean(true));
    fields.insert(Arc::from("y"), ParquetValue::Null);
    let record = ParquetValue::Record(fields);
    let field = Field::new(
        "record",
        DataType::Struct(
            vec![
                Field::new("x", DataType::Boolean, false),
                Field::new("y", DataType::Utf8, true),
            ]
            .into(),
        ),
        true,
    );
    let array =
        parquet_values_to_arrow_array(vec![record.clone(), ParquetValue::Null], &field).unwrap();
    assert_eq!(arrow_to_parquet_value(array.as_ref(), 0).unwrap(), record);
    assert_eq!(
        arrow_to_parquet_value(array.as_ref(), 1).unwrap(),
        ParquetValue::Null
    );
}

#[test]
fn test_value_kind_mismatch() {
    let field = Field::new("flag", DataType::Boolean, true);
    let err = parquet_values_to_arrow_array(vec![ParquetValue::Int32(1)], &field).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref path, .. } if path == "flag"));
}
