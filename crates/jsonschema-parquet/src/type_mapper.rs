//! JSON Schema primitive type (+ format) to Parquet type mapping

use crate::json_schema::TypeSet;
use crate::schema::{LogicalAnnotation, PhysicalType};
use crate::{Error, Result};

/// Result of mapping a type union
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    pub physical: PhysicalType,
    pub logical: Option<LogicalAnnotation>,
    /// `null` was one of the union members
    pub nullable: bool,
    /// The carrier type had no mapping and fell back to UTF-8 text
    pub lossy: bool,
}

impl TypeMapping {
    fn new(physical: PhysicalType, logical: Option<LogicalAnnotation>, nullable: bool) -> Self {
        Self {
            physical,
            logical,
            nullable,
            lossy: false,
        }
    }

    /// The opaque text mapping used for anything without a real mapping
    pub fn text_fallback(nullable: bool) -> Self {
        Self {
            physical: PhysicalType::ByteArray,
            logical: Some(LogicalAnnotation::Utf8),
            nullable,
            lossy: true,
        }
    }
}

/// Map a type union and optional format to a Parquet type
///
/// The carrier is the first non-`null` member. Unknown carriers (and an
/// empty type set) map to the lossy UTF-8 fallback rather than failing; a set
/// holding only `null` has nothing to carry and is an error.
pub fn map_type(types: &TypeSet, format: Option<&str>, path: &str) -> Result<TypeMapping> {
    let nullable = types.is_nullable();
    if types.is_empty() {
        return Ok(TypeMapping::text_fallback(nullable));
    }

    let Some(carrier) = types.carrier() else {
        return Err(Error::unsupported_type(
            path,
            "type union contains only `null`",
        ));
    };

    let mapping = match (carrier, format) {
        ("string", Some("date")) => TypeMapping::new(
            PhysicalType::ByteArray,
            Some(LogicalAnnotation::Date),
            nullable,
        ),
        ("string", Some("date-time")) => TypeMapping::new(
            PhysicalType::ByteArray,
            Some(LogicalAnnotation::DateTime),
            nullable,
        ),
        ("string", _) => TypeMapping::new(
            PhysicalType::ByteArray,
            Some(LogicalAnnotation::Utf8),
            nullable,
        ),
        ("integer", _) => TypeMapping::new(PhysicalType::Int64, None, nullable),
        ("number", Some("float")) => TypeMapping::new(PhysicalType::Float, None, nullable),
        ("number", _) => TypeMapping::new(PhysicalType::Double, None, nullable),
        ("boolean", _) => TypeMapping::new(PhysicalType::Boolean, None, nullable),
        ("array", _) => TypeMapping::new(PhysicalType::List, None, nullable),
        ("object", _) => TypeMapping::new(PhysicalType::Group, None, nullable),
        _ => TypeMapping::text_fallback(nullable),
    };

    Ok(mapping)
}
