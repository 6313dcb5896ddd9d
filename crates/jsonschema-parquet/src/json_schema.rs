//! Typed model of the JSON Schema subset the compiler understands
//!
//! The document is parsed once from a `serde_json::Value` into
//! [`JsonSchemaNode`]s and never mutated afterwards. Recognized keywords:
//! `type`, `properties`, `required`, `items`, `additionalProperties`,
//! `format`, `description`, `enum`, `$ref` and `$defs`. Everything else is
//! ignored.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::str::FromStr;

/// One node of an input schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonSchemaNode {
    pub types: TypeSet,
    /// Property subschemas in declaration order
    pub properties: IndexMap<String, SubSchema>,
    pub required: Vec<String>,
    pub items: Option<SubSchema>,
    pub additional_properties: Option<SubSchema>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub reference: Option<String>,
    /// This node's own `$defs`, reachable through nested pointer segments
    pub defs: IndexMap<String, SubSchema>,
}

/// A subschema slot
///
/// JSON Schema allows non-object subschemas (`true`, `false`) and documents
/// in the wild contain plain mistakes; both are kept as `Invalid` so the
/// compiler can report them against the field that uses them.
#[derive(Debug, Clone, PartialEq)]
pub enum SubSchema {
    Node(Box<JsonSchemaNode>),
    Invalid(Value),
}

/// Ordered, de-duplicated set of JSON Schema type names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet(Vec<String>);

/// Mapping from definition name to subschema, owned by the document root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDefinitionTable {
    entries: IndexMap<String, SubSchema>,
}

/// A parsed schema document: the root node plus its definition table
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    pub root: JsonSchemaNode,
    pub definitions: SchemaDefinitionTable,
}

impl TypeSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !set.contains(&name) {
                set.push(name);
            }
        }
        TypeSet(set)
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(name)) => TypeSet::new([name.as_str()]),
            Some(Value::Array(names)) => {
                TypeSet::new(names.iter().filter_map(Value::as_str))
            }
            _ => TypeSet::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    /// `true` when `null` is one of the union members
    pub fn is_nullable(&self) -> bool {
        self.contains("null")
    }

    /// The first member that is not `null`
    pub fn carrier(&self) -> Option<&str> {
        self.0.iter().map(String::as_str).find(|n| *n != "null")
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl SubSchema {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => SubSchema::Node(Box::new(JsonSchemaNode::from_map(map))),
            other => SubSchema::Invalid(other.clone()),
        }
    }

    pub fn as_node(&self) -> Option<&JsonSchemaNode> {
        match self {
            SubSchema::Node(node) => Some(&**node),
            SubSchema::Invalid(_) => None,
        }
    }
}

impl JsonSchemaNode {
    /// Parse a schema node; the value must be a JSON object
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(Error::invalid_schema(
                "$",
                format!("schema must be a JSON object, got {}", json_kind(other)),
            )),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let subschemas = |key: &str| -> IndexMap<String, SubSchema> {
            match map.get(key) {
                Some(Value::Object(entries)) => entries
                    .iter()
                    .map(|(name, value)| (name.clone(), SubSchema::from_value(value)))
                    .collect(),
                _ => IndexMap::new(),
            }
        };

        let required = match map.get("required") {
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        // Boolean `additionalProperties` only constrains validation
        let additional_properties = match map.get("additionalProperties") {
            Some(value @ Value::Object(_)) => Some(SubSchema::from_value(value)),
            _ => None,
        };

        Self {
            types: TypeSet::from_value(map.get("type")),
            properties: subschemas("properties"),
            required,
            items: map.get("items").map(SubSchema::from_value),
            additional_properties,
            format: string_keyword(map, "format"),
            description: string_keyword(map, "description"),
            enum_values: match map.get("enum") {
                Some(Value::Array(values)) => Some(values.clone()),
                _ => None,
            },
            reference: string_keyword(map, "$ref"),
            defs: subschemas("$defs"),
        }
    }

    /// Start building a node of a single type
    pub fn of_type(name: &str) -> Self {
        Self {
            types: TypeSet::new([name]),
            ..Self::default()
        }
    }

    /// A node that only carries a `$ref`
    pub fn from_ref(pointer: impl Into<String>) -> Self {
        Self {
            reference: Some(pointer.into()),
            ..Self::default()
        }
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }

    /// Look up a definition by name in this node's own `$defs`
    pub fn nested_definition(&self, name: &str) -> Option<&SubSchema> {
        self.defs.get(name)
    }
}

impl SchemaDefinitionTable {
    pub fn new(entries: IndexMap<String, SubSchema>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&SubSchema> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl SchemaDocument {
    /// Parse a document from an in-memory JSON value
    pub fn from_value(value: &Value) -> Result<Self> {
        let root = JsonSchemaNode::from_value(value)?;
        Ok(Self::from_root(root))
    }

    /// Use `root`'s `$defs` as the document's definition table
    pub fn from_root(root: JsonSchemaNode) -> Self {
        let definitions = SchemaDefinitionTable::new(root.defs.clone());
        Self { root, definitions }
    }
}

impl FromStr for SchemaDocument {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }
}

fn string_keyword(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Short name of a JSON value's kind, for messages
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
