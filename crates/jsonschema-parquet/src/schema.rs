use serde_json::Value;
use std::fmt;

/// Represents a node in the compiled Parquet schema tree
///
/// Produced by [`crate::SchemaCompiler`], rendered to and parsed from the tag
/// grammar by [`crate::tag`], and consumed read-only by the writer and reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetFieldSpec {
    /// Column name as stored in the Parquet file
    pub name: String,
    /// Original JSON key when `name` had to be sanitized
    pub in_name: Option<String>,
    pub physical_type: PhysicalType,
    pub logical: Option<LogicalAnnotation>,
    pub repetition: Repetition,
    /// Non-empty only for LIST (`element`), MAP (`key`, `value`) and GROUP
    pub children: Vec<ParquetFieldSpec>,
    pub metadata: FieldMetadata,
}

/// Physical types a field can compile to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    ByteArray,
    Int32,
    Int64,
    Float,
    Double,
    Boolean,
    List,
    Map,
    Group,
}

/// Refines how a physical type is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalAnnotation {
    /// UTF-8 text
    Utf8,
    /// UTF-8 text holding a calendar date (`format: date`)
    Date,
    /// UTF-8 text holding an RFC 3339 timestamp (`format: date-time`)
    DateTime,
}

/// Represents how values are repeated in Parquet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repetition {
    /// Field must have exactly one value
    Required,
    /// Field can have 0 or 1 value
    Optional,
    /// Field can have 0 or more values
    Repeated,
}

/// Documentation carried along with a field
///
/// Nothing here changes the physical encoding. `opaque` marks fields that
/// compiled to the text fallback; the writer stores any JSON value in them as
/// its JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMetadata {
    pub description: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub opaque: bool,
}

impl PhysicalType {
    /// Name used in the tag grammar
    pub fn as_str(&self) -> &'static str {
        match self {
            PhysicalType::ByteArray => "BYTE_ARRAY",
            PhysicalType::Int32 => "INT32",
            PhysicalType::Int64 => "INT64",
            PhysicalType::Float => "FLOAT",
            PhysicalType::Double => "DOUBLE",
            PhysicalType::Boolean => "BOOLEAN",
            PhysicalType::List => "LIST",
            PhysicalType::Map => "MAP",
            PhysicalType::Group => "GROUP",
        }
    }

    /// Parse a tag grammar type name (case-insensitive)
    pub fn from_tag(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_uppercase().as_str() {
            "BYTE_ARRAY" => PhysicalType::ByteArray,
            "INT32" => PhysicalType::Int32,
            "INT64" => PhysicalType::Int64,
            "FLOAT" => PhysicalType::Float,
            "DOUBLE" => PhysicalType::Double,
            "BOOLEAN" => PhysicalType::Boolean,
            "LIST" => PhysicalType::List,
            "MAP" => PhysicalType::Map,
            "GROUP" => PhysicalType::Group,
            _ => return None,
        };
        Some(ty)
    }

    /// Check if this type has children
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            PhysicalType::List | PhysicalType::Map | PhysicalType::Group
        )
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LogicalAnnotation {
    /// The `convertedtype=` value; date tags are UTF8 strings underneath
    pub fn converted_type(&self) -> &'static str {
        "UTF8"
    }

    /// The JSON Schema format this annotation came from
    pub fn format(&self) -> Option<&'static str> {
        match self {
            LogicalAnnotation::Utf8 => None,
            LogicalAnnotation::Date => Some("date"),
            LogicalAnnotation::DateTime => Some("date-time"),
        }
    }

    /// Build an annotation from a `convertedtype=` value and an optional format
    pub fn from_tag(converted_type: &str, format: Option<&str>) -> Option<Self> {
        if !converted_type.eq_ignore_ascii_case("UTF8") {
            return None;
        }
        Some(match format {
            Some("date") => LogicalAnnotation::Date,
            Some("date-time") => LogicalAnnotation::DateTime,
            _ => LogicalAnnotation::Utf8,
        })
    }
}

impl Repetition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Repetition::Required => "REQUIRED",
            Repetition::Optional => "OPTIONAL",
            Repetition::Repeated => "REPEATED",
        }
    }

    pub fn from_tag(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "REQUIRED" => Some(Repetition::Required),
            "OPTIONAL" => Some(Repetition::Optional),
            "REPEATED" => Some(Repetition::Repeated),
            _ => None,
        }
    }
}

impl fmt::Display for Repetition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ParquetFieldSpec {
    /// Create a leaf field
    pub fn leaf(name: impl Into<String>, physical_type: PhysicalType, repetition: Repetition) -> Self {
        Self {
            name: name.into(),
            in_name: None,
            physical_type,
            logical: None,
            repetition,
            children: Vec::new(),
            metadata: FieldMetadata::default(),
        }
    }

    /// Create a UTF-8 string leaf
    pub fn utf8(name: impl Into<String>, repetition: Repetition) -> Self {
        Self::leaf(name, PhysicalType::ByteArray, repetition).with_logical(LogicalAnnotation::Utf8)
    }

    /// Create a GROUP with the given children
    pub fn group(
        name: impl Into<String>,
        repetition: Repetition,
        children: Vec<ParquetFieldSpec>,
    ) -> Self {
        Self {
            children,
            ..Self::leaf(name, PhysicalType::Group, repetition)
        }
    }

    /// Create a LIST; the element is renamed to `element`
    pub fn list(name: impl Into<String>, repetition: Repetition, element: ParquetFieldSpec) -> Self {
        Self {
            children: vec![element.renamed("element")],
            ..Self::leaf(name, PhysicalType::List, repetition)
        }
    }

    /// Create a MAP; children are renamed to `key` and `value`
    pub fn map(
        name: impl Into<String>,
        repetition: Repetition,
        key: ParquetFieldSpec,
        value: ParquetFieldSpec,
    ) -> Self {
        Self {
            children: vec![key.renamed("key"), value.renamed("value")],
            ..Self::leaf(name, PhysicalType::Map, repetition)
        }
    }

    pub fn with_logical(mut self, logical: LogicalAnnotation) -> Self {
        self.logical = Some(logical);
        self
    }

    pub fn with_in_name(mut self, in_name: impl Into<String>) -> Self {
        self.in_name = Some(in_name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: FieldMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self.in_name = None;
        self
    }

    /// Check if this node is nullable
    pub fn is_nullable(&self) -> bool {
        self.repetition == Repetition::Optional
    }

    pub fn is_leaf(&self) -> bool {
        !self.physical_type.is_nested()
    }

    /// Key used for this field in JSON records
    pub fn json_key(&self) -> &str {
        self.in_name.as_deref().unwrap_or(&self.name)
    }

    /// Find a direct child by column name
    pub fn child(&self, name: &str) -> Option<&ParquetFieldSpec> {
        self.children.iter().find(|c| c.name == name)
    }

    /// The `element` child of a LIST
    pub fn element(&self) -> Option<&ParquetFieldSpec> {
        match self.physical_type {
            PhysicalType::List => self.children.first(),
            _ => None,
        }
    }

    /// The `key` and `value` children of a MAP
    pub fn key_value(&self) -> Option<(&ParquetFieldSpec, &ParquetFieldSpec)> {
        match (self.physical_type, self.children.as_slice()) {
            (PhysicalType::Map, [key, value]) => Some((key, value)),
            _ => None,
        }
    }
}
