//! Bidirectional conversion between Arrow and the compiled schema/value model
//!
//! Compiled [`ParquetFieldSpec`] trees map onto Arrow fields that the parquet
//! crate's Arrow writer turns back into exactly the physical layout the spec
//! describes: `BYTE_ARRAY/UTF8` is `Utf8`, LIST is a `List` whose item field is
//! named `element`, MAP is a `Map` with a `key_value` entries struct.
//! Values move between [`ParquetValue`] and Arrow arrays one column at a time.

use crate::schema::{ParquetFieldSpec, PhysicalType, Repetition};
use crate::{Error, ParquetValue, Result};
use arrow_array::{builder::*, Array, ArrayRef, ListArray, MapArray, StructArray};
use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::sync::Arc;

/// Name of the repeated entries struct inside a MAP
const MAP_ENTRIES: &str = "key_value";

/// Convert a compiled root spec to an Arrow schema
///
/// The root must be a GROUP; its children become the top-level columns.
pub fn spec_to_arrow_schema(spec: &ParquetFieldSpec) -> Result<SchemaRef> {
    if spec.physical_type != PhysicalType::Group {
        return Err(Error::invalid_argument(format!(
            "root field `{}` must be a GROUP to be written as rows, found {}",
            spec.name, spec.physical_type
        )));
    }

    let fields = spec
        .children
        .iter()
        .map(spec_to_arrow_field)
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

/// Convert a compiled field to an Arrow field
pub fn spec_to_arrow_field(spec: &ParquetFieldSpec) -> Result<Field> {
    let nullable = match spec.repetition {
        Repetition::Required => false,
        Repetition::Optional => true,
        Repetition::Repeated => {
            return Err(Error::invalid_schema(
                &spec.name,
                "REPEATED is only valid on the synthetic children of LIST and MAP",
            ))
        }
    };

    let data_type = match spec.physical_type {
        PhysicalType::ByteArray => DataType::Utf8,
        PhysicalType::Int32 => DataType::Int32,
        PhysicalType::Int64 => DataType::Int64,
        PhysicalType::Float => DataType::Float32,
        PhysicalType::Double => DataType::Float64,
        PhysicalType::Boolean => DataType::Boolean,
        PhysicalType::List => {
            let element = spec
                .element()
                .ok_or_else(|| Error::invalid_schema(&spec.name, "LIST field has no element"))?;
            let element = spec_to_arrow_field(element)?;
            DataType::List(Arc::new(element.with_name("element")))
        }
        PhysicalType::Map => {
            let (key, value) = spec
                .key_value()
                .ok_or_else(|| Error::invalid_schema(&spec.name, "MAP field has no key/value"))?;
            let key = spec_to_arrow_field(key)?
                .with_name("key")
                .with_nullable(false);
            let value = spec_to_arrow_field(value)?.with_name("value");
            let entries = Field::new(
                MAP_ENTRIES,
                DataType::Struct(Fields::from(vec![key, value])),
                false,
            );
            DataType::Map(Arc::new(entries), false)
        }
        PhysicalType::Group => {
            let fields = spec
                .children
                .iter()
                .map(spec_to_arrow_field)
                .collect::<Result<Vec<_>>>()?;
            DataType::Struct(fields.into())
        }
    };

    Ok(Field::new(&spec.name, data_type, nullable))
}

/// Derive a compiled spec from an Arrow schema, for files without an embedded one
pub fn spec_from_arrow_schema(schema: &Schema, name: &str) -> Result<ParquetFieldSpec> {
    let children = schema
        .fields()
        .iter()
        .map(|field| spec_from_arrow_field(field, name))
        .collect::<Result<Vec<_>>>()?;
    Ok(ParquetFieldSpec::group(name, Repetition::Required, children))
}

pub(crate) fn spec_from_arrow_field(field: &Field, parent: &str) -> Result<ParquetFieldSpec> {
    let path = format!("{}.{}", parent, field.name());
    let repetition = if field.is_nullable() {
        Repetition::Optional
    } else {
        Repetition::Required
    };

    let spec = match field.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => ParquetFieldSpec::utf8(field.name(), repetition),
        DataType::Int32 => ParquetFieldSpec::leaf(field.name(), PhysicalType::Int32, repetition),
        DataType::Int64 => ParquetFieldSpec::leaf(field.name(), PhysicalType::Int64, repetition),
        DataType::Float32 => ParquetFieldSpec::leaf(field.name(), PhysicalType::Float, repetition),
        DataType::Float64 => ParquetFieldSpec::leaf(field.name(), PhysicalType::Double, repetition),
        DataType::Boolean => {
            ParquetFieldSpec::leaf(field.name(), PhysicalType::Boolean, repetition)
        }
        DataType::List(item) => {
            ParquetFieldSpec::list(field.name(), repetition, spec_from_arrow_field(item, &path)?)
        }
        DataType::Map(entries, _) => match entries.data_type() {
            DataType::Struct(kv) if kv.len() == 2 => ParquetFieldSpec::map(
                field.name(),
                repetition,
                spec_from_arrow_field(&kv[0], &path)?,
                spec_from_arrow_field(&kv[1], &path)?,
            ),
            _ => {
                return Err(Error::corrupt_data(format!(
                    "map column `{}` has malformed entries",
                    path
                )))
            }
        },
        DataType::Struct(fields) => ParquetFieldSpec::group(
            field.name(),
            repetition,
            fields
                .iter()
                .map(|child| spec_from_arrow_field(child, &path))
                .collect::<Result<Vec<_>>>()?,
        ),
        dt => {
            return Err(Error::unsupported_type(
                path,
                format!("no JSON mapping for Arrow type {:?}", dt),
            ))
        }
    };

    Ok(spec)
}

/// Convert a single value from an Arrow array at the given index to a ParquetValue
pub fn arrow_to_parquet_value(array: &dyn Array, index: usize) -> Result<ParquetValue> {
    use arrow_array::*;

    if array.is_null(index) {
        return Ok(ParquetValue::Null);
    }

    match array.data_type() {
        // Primitive types
        DataType::Boolean => {
            let array = downcast_array::<BooleanArray>(array)?;
            Ok(ParquetValue::Boolean(array.value(index)))
        }
        DataType::Int32 => {
            let array = downcast_array::<Int32Array>(array)?;
            Ok(ParquetValue::Int32(array.value(index)))
        }
        DataType::Int64 => {
            let array = downcast_array::<Int64Array>(array)?;
            Ok(ParquetValue::Int64(array.value(index)))
        }
        DataType::Float32 => {
            let array = downcast_array::<Float32Array>(array)?;
            Ok(ParquetValue::Float32(OrderedFloat(array.value(index))))
        }
        DataType::Float64 => {
            let array = downcast_array::<Float64Array>(array)?;
            Ok(ParquetValue::Float64(OrderedFloat(array.value(index))))
        }

        // String types
        DataType::Utf8 => {
            let array = downcast_array::<StringArray>(array)?;
            Ok(ParquetValue::String(Arc::from(array.value(index))))
        }
        DataType::LargeUtf8 => {
            let array = downcast_array::<LargeStringArray>(array)?;
            Ok(ParquetValue::String(Arc::from(array.value(index))))
        }

        // Complex types
        DataType::List(_) => {
            let array = downcast_array::<ListArray>(array)?;
            let list_values = array.value(index);

            let mut values = Vec::with_capacity(list_values.len());
            for i in 0..list_values.len() {
                values.push(arrow_to_parquet_value(&list_values, i)?);
            }

            Ok(ParquetValue::List(values))
        }
        DataType::Map(_, _) => {
            let array = downcast_array::<MapArray>(array)?;
            let map_value = array.value(index);

            // Map is stored as a struct with two fields: keys and values
            let keys = map_value.column(0);
            let values = map_value.column(1);

            let mut map_vec = Vec::with_capacity(keys.len());
            for i in 0..keys.len() {
                let key = arrow_to_parquet_value(keys, i)?;
                let value = arrow_to_parquet_value(values, i)?;
                map_vec.push((key, value));
            }

            Ok(ParquetValue::Map(map_vec))
        }
        DataType::Struct(_) => {
            let array = downcast_array::<StructArray>(array)?;

            let mut map = IndexMap::new();
            for (col_idx, field) in array.fields().iter().enumerate() {
                let column = array.column(col_idx);
                let value = arrow_to_parquet_value(column, index)?;
                map.insert(Arc::from(field.name().as_str()), value);
            }

            Ok(ParquetValue::Record(map))
        }

        dt => Err(Error::corrupt_data(format!(
            "Unsupported data type for conversion: {:?}",
            dt
        ))),
    }
}

/// Convert a vector of ParquetValues to an Arrow array
pub fn parquet_values_to_arrow_array(values: Vec<ParquetValue>, field: &Field) -> Result<ArrayRef> {
    match field.data_type() {
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(values.len());
            for value in values {
                match value {
                    ParquetValue::Boolean(b) => builder.append_value(b),
                    ParquetValue::Null => builder.append_null(),
                    other => return Err(unexpected(field, "Boolean", &other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Int32 => {
            let mut builder = Int32Builder::with_capacity(values.len());
            for value in values {
                match value {
                    ParquetValue::Int32(i) => builder.append_value(i),
                    ParquetValue::Null => builder.append_null(),
                    other => return Err(unexpected(field, "Int32", &other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    ParquetValue::Int64(i) => builder.append_value(i),
                    ParquetValue::Int32(i) => builder.append_value(i as i64),
                    ParquetValue::Null => builder.append_null(),
                    other => return Err(unexpected(field, "Int64", &other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Float32 => {
            let mut builder = Float32Builder::with_capacity(values.len());
            for value in values {
                match value {
                    ParquetValue::Float32(OrderedFloat(f)) => builder.append_value(f),
                    ParquetValue::Null => builder.append_null(),
                    other => return Err(unexpected(field, "Float32", &other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    ParquetValue::Float64(OrderedFloat(f)) => builder.append_value(f),
                    ParquetValue::Float32(OrderedFloat(f)) => builder.append_value(f as f64),
                    ParquetValue::Null => builder.append_null(),
                    other => return Err(unexpected(field, "Float64", &other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * 16);
            for value in values {
                match value {
                    ParquetValue::String(s) => builder.append_value(&s),
                    ParquetValue::Null => builder.append_null(),
                    other => return Err(unexpected(field, "String", &other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }

        // Complex types
        DataType::List(item_field) => build_list_array(values, field, item_field),
        DataType::Map(entries_field, sorted) => {
            build_map_array(values, field, entries_field, *sorted)
        }
        DataType::Struct(fields) => build_struct_array(values, field, fields),

        dt => Err(Error::unsupported_type(
            field.name(),
            format!("cannot build Arrow arrays of type {:?}", dt),
        )),
    }
}

/// Helper function to downcast an array with better error messages
fn downcast_array<T: 'static>(array: &dyn Array) -> Result<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::corrupt_data(format!("Failed to cast to {}", std::any::type_name::<T>()))
    })
}

fn unexpected(field: &Field, expected: &str, value: &ParquetValue) -> Error {
    Error::type_mismatch(field.name(), expected, value.type_name())
}

/// Build list array
fn build_list_array(
    values: Vec<ParquetValue>,
    field: &Field,
    item_field: &Arc<Field>,
) -> Result<ArrayRef> {
    let mut all_items = Vec::new();
    let mut offsets = Vec::with_capacity(values.len() + 1);
    let mut null_buffer_builder = arrow_buffer::BooleanBufferBuilder::new(values.len());
    offsets.push(0i32);

    for value in values {
        match value {
            ParquetValue::List(items) => {
                all_items.extend(items);
                offsets.push(offset(all_items.len())?);
                null_buffer_builder.append(true);
            }
            ParquetValue::Null => {
                offsets.push(offset(all_items.len())?);
                null_buffer_builder.append(false);
            }
            other => return Err(unexpected(field, "List", &other)),
        }
    }

    let item_array = parquet_values_to_arrow_array(all_items, item_field)?;
    let offset_buffer = arrow_buffer::OffsetBuffer::new(offsets.into());
    let null_buffer = null_buffer_builder.finish();

    Ok(Arc::new(ListArray::try_new(
        item_field.clone(),
        offset_buffer,
        item_array,
        Some(null_buffer.into()),
    )?))
}

/// Build map array
fn build_map_array(
    values: Vec<ParquetValue>,
    field: &Field,
    entries_field: &Arc<Field>,
    sorted: bool,
) -> Result<ArrayRef> {
    // Extract the key and value fields from the entries struct
    let struct_fields = match entries_field.data_type() {
        DataType::Struct(fields) if fields.len() == 2 => fields.clone(),
        _ => {
            return Err(Error::invalid_schema(
                field.name(),
                "Map entries field must be a struct with exactly 2 fields",
            ))
        }
    };

    let mut all_keys = Vec::new();
    let mut all_values = Vec::new();
    let mut offsets = Vec::with_capacity(values.len() + 1);
    let mut null_buffer_builder = arrow_buffer::BooleanBufferBuilder::new(values.len());
    offsets.push(0i32);

    for value in values {
        match value {
            ParquetValue::Map(entries) => {
                for (k, v) in entries {
                    all_keys.push(k);
                    all_values.push(v);
                }
                offsets.push(offset(all_keys.len())?);
                null_buffer_builder.append(true);
            }
            ParquetValue::Null => {
                offsets.push(offset(all_keys.len())?);
                null_buffer_builder.append(false);
            }
            other => return Err(unexpected(field, "Map", &other)),
        }
    }

    let key_array = parquet_values_to_arrow_array(all_keys, &struct_fields[0])?;
    let value_array = parquet_values_to_arrow_array(all_values, &struct_fields[1])?;
    let entries = StructArray::try_new(struct_fields, vec![key_array, value_array], None)?;

    let offset_buffer = arrow_buffer::OffsetBuffer::new(offsets.into());
    let null_buffer = null_buffer_builder.finish();

    Ok(Arc::new(MapArray::try_new(
        entries_field.clone(),
        offset_buffer,
        entries,
        Some(null_buffer.into()),
        sorted,
    )?))
}

/// Build struct array
fn build_struct_array(values: Vec<ParquetValue>, field: &Field, fields: &Fields) -> Result<ArrayRef> {
    let num_rows = values.len();
    let mut null_buffer_builder = arrow_buffer::BooleanBufferBuilder::new(num_rows);

    // Prepare columns for each field
    let mut field_columns: Vec<Vec<ParquetValue>> =
        vec![Vec::with_capacity(num_rows); fields.len()];

    for value in values {
        match value {
            ParquetValue::Record(mut map) => {
                null_buffer_builder.append(true);
                for (idx, child) in fields.iter().enumerate() {
                    let field_value = map
                        .shift_remove(child.name().as_str())
                        .unwrap_or(ParquetValue::Null);
                    field_columns[idx].push(field_value);
                }
            }
            ParquetValue::Null => {
                null_buffer_builder.append(false);
                for field_column in field_columns.iter_mut() {
                    field_column.push(ParquetValue::Null);
                }
            }
            other => return Err(unexpected(field, "Record", &other)),
        }
    }

    // Build arrays for each field
    let field_arrays = field_columns
        .into_iter()
        .zip(fields.iter())
        .map(|(column, child)| parquet_values_to_arrow_array(column, child))
        .collect::<Result<Vec<_>>>()?;

    let null_buffer = null_buffer_builder.finish();
    Ok(Arc::new(StructArray::try_new(
        fields.clone(),
        field_arrays,
        Some(null_buffer.into()),
    )?))
}

fn offset(len: usize) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| Error::invalid_argument("nested values exceed the 32-bit offset range"))
}
