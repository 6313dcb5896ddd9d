use crate::json_schema::json_kind;
use crate::schema::{LogicalAnnotation, ParquetFieldSpec, PhysicalType, Repetition};
use crate::{Error, Result};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// A record value after coercion to its field's physical type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParquetValue {
    // Numeric types
    Int32(i32),
    Int64(i64),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),

    // Basic types
    Boolean(bool),
    String(Arc<str>),

    // Complex types
    List(Vec<ParquetValue>),
    Map(Vec<(ParquetValue, ParquetValue)>), // Using Vec of tuples for deterministic ordering
    Record(IndexMap<Arc<str>, ParquetValue>), // Keyed by column name, in schema order

    // Null value
    Null,
}

impl std::hash::Hash for ParquetValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ParquetValue::Int32(i) => i.hash(state),
            ParquetValue::Int64(i) => i.hash(state),
            ParquetValue::Float32(f) => f.hash(state),
            ParquetValue::Float64(f) => f.hash(state),
            ParquetValue::Boolean(b) => b.hash(state),
            ParquetValue::String(s) => s.hash(state),
            ParquetValue::List(l) => l.hash(state),
            ParquetValue::Map(m) => m.hash(state),
            ParquetValue::Record(r) => {
                // IndexMap preserves insertion order, so hash is deterministic
                for (k, v) in r {
                    k.hash(state);
                    v.hash(state);
                }
            }
            ParquetValue::Null => 0_i32.hash(state),
        }
    }
}

impl ParquetValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, ParquetValue::Null)
    }

    /// Get the type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            ParquetValue::Int32(_) => "Int32",
            ParquetValue::Int64(_) => "Int64",
            ParquetValue::Float32(_) => "Float32",
            ParquetValue::Float64(_) => "Float64",
            ParquetValue::Boolean(_) => "Boolean",
            ParquetValue::String(_) => "String",
            ParquetValue::List(_) => "List",
            ParquetValue::Map(_) => "Map",
            ParquetValue::Record(_) => "Record",
            ParquetValue::Null => "Null",
        }
    }

    /// Coerce a JSON value to the physical type of `spec`
    ///
    /// `value` is `None` when the key was absent from the enclosing object.
    /// An absent optional key and an explicit `null` both become
    /// [`ParquetValue::Null`], so reading back yields `null` for the key.
    /// Fractional numbers stored into integer columns are truncated toward
    /// zero; everything else that does not fit, including numbers beyond the
    /// FLOAT range, is a [`Error::TypeMismatch`] naming `path`.
    pub fn from_json(value: Option<&Value>, spec: &ParquetFieldSpec, path: &str) -> Result<Self> {
        let value = match value {
            None | Some(Value::Null) => {
                if spec.repetition == Repetition::Required {
                    let found = if value.is_some() { "null" } else { "missing value" };
                    return Err(Error::type_mismatch(path, expected(spec), found));
                }
                return Ok(ParquetValue::Null);
            }
            Some(value) => value,
        };

        match spec.physical_type {
            PhysicalType::Int64 => {
                integer(value, i64::MIN, i64::MAX, spec, path).map(ParquetValue::Int64)
            }
            PhysicalType::Int32 => integer(value, i32::MIN as i64, i32::MAX as i64, spec, path)
                .map(|i| ParquetValue::Int32(i as i32)),
            PhysicalType::Float => match value.as_f64() {
                Some(f) if (f as f32).is_finite() => {
                    Ok(ParquetValue::Float32(OrderedFloat(f as f32)))
                }
                Some(_) => Err(Error::type_mismatch(path, "FLOAT in range", value.to_string())),
                None => Err(mismatch(value, spec, path)),
            },
            PhysicalType::Double => match value.as_f64() {
                Some(f) => Ok(ParquetValue::Float64(OrderedFloat(f))),
                None => Err(mismatch(value, spec, path)),
            },
            PhysicalType::Boolean => match value {
                Value::Bool(b) => Ok(ParquetValue::Boolean(*b)),
                other => Err(mismatch(other, spec, path)),
            },
            PhysicalType::ByteArray => text(value, spec, path).map(ParquetValue::String),
            PhysicalType::List => {
                let Value::Array(items) = value else {
                    return Err(mismatch(value, spec, path));
                };
                let element = spec
                    .element()
                    .ok_or_else(|| Error::invalid_schema(path, "LIST field has no element"))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        ParquetValue::from_json(Some(item), element, &format!("{}[{}]", path, i))
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(ParquetValue::List)
            }
            PhysicalType::Map => {
                let Value::Object(entries) = value else {
                    return Err(mismatch(value, spec, path));
                };
                let (_, value_spec) = spec
                    .key_value()
                    .ok_or_else(|| Error::invalid_schema(path, "MAP field has no key/value"))?;
                entries
                    .iter()
                    .map(|(key, entry)| {
                        let entry_path = format!("{}.{}", path, key);
                        Ok((
                            ParquetValue::String(Arc::from(key.as_str())),
                            ParquetValue::from_json(Some(entry), value_spec, &entry_path)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(ParquetValue::Map)
            }
            PhysicalType::Group => {
                let Value::Object(fields) = value else {
                    return Err(mismatch(value, spec, path));
                };
                let mut record = IndexMap::with_capacity(spec.children.len());
                for child in &spec.children {
                    let key = child.json_key();
                    let child_path = format!("{}.{}", path, key);
                    let coerced = ParquetValue::from_json(fields.get(key), child, &child_path)?;
                    record.insert(Arc::from(child.name.as_str()), coerced);
                }
                Ok(ParquetValue::Record(record))
            }
        }
    }

    /// Convert back to JSON, shaped by `spec`
    ///
    /// Record keys use each field's original JSON key. Non-finite floats
    /// have no JSON form and come out as `null`.
    pub fn to_json(&self, spec: &ParquetFieldSpec) -> Value {
        match self {
            ParquetValue::Null => Value::Null,
            ParquetValue::Int32(i) => Value::from(*i),
            ParquetValue::Int64(i) => Value::from(*i),
            // shortest decimal form of the f32, not its widened binary value
            ParquetValue::Float32(f) => f
                .0
                .to_string()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
            ParquetValue::Float64(f) => Number::from_f64(f.0).map_or(Value::Null, Value::Number),
            ParquetValue::Boolean(b) => Value::Bool(*b),
            ParquetValue::String(s) => Value::String(s.to_string()),
            ParquetValue::List(items) => match spec.element() {
                Some(element) => Value::Array(items.iter().map(|v| v.to_json(element)).collect()),
                None => Value::Array(items.iter().map(|v| v.to_json(spec)).collect()),
            },
            ParquetValue::Map(entries) => {
                let value_spec = spec.key_value().map(|(_, value)| value).unwrap_or(spec);
                let mut object = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = match key {
                        ParquetValue::String(s) => s.to_string(),
                        other => other.to_json(spec).to_string(),
                    };
                    object.insert(key, value.to_json(value_spec));
                }
                Value::Object(object)
            }
            ParquetValue::Record(fields) => {
                let mut object = Map::with_capacity(fields.len());
                for (name, value) in fields {
                    match spec.child(name) {
                        Some(child) => {
                            object.insert(child.json_key().to_string(), value.to_json(child))
                        }
                        None => object.insert(name.to_string(), value.to_json(spec)),
                    };
                }
                Value::Object(object)
            }
        }
    }
}

/// What a field accepts, for mismatch messages
fn expected(spec: &ParquetFieldSpec) -> String {
    match (spec.physical_type, spec.logical) {
        (_, Some(LogicalAnnotation::Date)) => "date string (YYYY-MM-DD)".to_string(),
        (_, Some(LogicalAnnotation::DateTime)) => "RFC 3339 timestamp string".to_string(),
        (PhysicalType::ByteArray, _) if spec.metadata.opaque => "any JSON value".to_string(),
        (PhysicalType::ByteArray, _) => "string".to_string(),
        (PhysicalType::List, _) => "array".to_string(),
        (PhysicalType::Map, _) | (PhysicalType::Group, _) => "object".to_string(),
        (physical, _) => physical.to_string(),
    }
}

fn mismatch(value: &Value, spec: &ParquetFieldSpec, path: &str) -> Error {
    Error::type_mismatch(path, expected(spec), json_kind(value))
}

fn integer(value: &Value, min: i64, max: i64, spec: &ParquetFieldSpec, path: &str) -> Result<i64> {
    let Value::Number(number) = value else {
        return Err(mismatch(value, spec, path));
    };

    let int = if let Some(i) = number.as_i64() {
        Some(i)
    } else if number.is_u64() {
        None
    } else {
        number
            .as_f64()
            .map(f64::trunc)
            .filter(|f| f.is_finite() && *f >= min as f64 && *f < max as f64 + 1.0)
            .map(|f| f as i64)
    };

    match int {
        Some(i) if (min..=max).contains(&i) => Ok(i),
        _ => Err(Error::type_mismatch(
            path,
            format!("{} in range", spec.physical_type),
            format!("out-of-range number {}", number),
        )),
    }
}

fn text(value: &Value, spec: &ParquetFieldSpec, path: &str) -> Result<Arc<str>> {
    let s = match value {
        Value::String(s) => s.as_str(),
        other if spec.metadata.opaque => return Ok(Arc::from(other.to_string())),
        other => return Err(mismatch(other, spec, path)),
    };

    let valid = match spec.logical {
        Some(LogicalAnnotation::Date) => s.parse::<jiff::civil::Date>().is_ok(),
        Some(LogicalAnnotation::DateTime) => s.parse::<jiff::Timestamp>().is_ok(),
        _ => true,
    };
    if !valid {
        return Err(Error::type_mismatch(
            path,
            expected(spec),
            format!("string {:?}", s),
        ));
    }

    Ok(Arc::from(s))
}
