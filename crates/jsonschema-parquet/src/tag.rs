//! Textual tag interchange for compiled schemas
//!
//! Each field renders as one tag string
//!
//! ```text
//! name=<name>[, inname=<original>], type=<PHYSICAL>[, convertedtype=UTF8], repetitiontype=<REP>
//! ```
//!
//! nested under `{"Tag": ..., "Fields": [...]}` objects. Date formats and
//! field metadata ride along as extra `Format`, `Description`, `Enum` and
//! `Opaque` keys next to `Tag`, so the tag strings themselves stay readable by
//! tooling that only knows the plain grammar.

use crate::schema::{FieldMetadata, LogicalAnnotation, ParquetFieldSpec, PhysicalType, Repetition};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node of the tag tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(rename = "Tag", alias = "tag")]
    pub tag: String,
    #[serde(
        rename = "Fields",
        alias = "fields",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub fields: Vec<SchemaField>,
    #[serde(
        rename = "Format",
        alias = "format",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub format: Option<String>,
    #[serde(
        rename = "Description",
        alias = "description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "Enum",
        alias = "enum",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enum_values: Option<Vec<Value>>,
    #[serde(
        rename = "Opaque",
        alias = "opaque",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub opaque: bool,
}

/// Attributes of a single tag string
#[derive(Debug, Default)]
struct TagAttributes {
    name: Option<String>,
    in_name: Option<String>,
    physical_type: Option<String>,
    converted_type: Option<String>,
    repetition: Option<String>,
}

impl SchemaField {
    /// Build the tag tree for a compiled spec
    pub fn from_spec(spec: &ParquetFieldSpec) -> Self {
        Self {
            tag: render_tag(spec),
            fields: spec.children.iter().map(SchemaField::from_spec).collect(),
            format: spec
                .logical
                .and_then(|logical| logical.format())
                .map(str::to_string),
            description: spec.metadata.description.clone(),
            enum_values: spec.metadata.enum_values.clone(),
            opaque: spec.metadata.opaque,
        }
    }

    /// Rebuild the compiled spec described by this tag tree
    pub fn to_spec(&self) -> Result<ParquetFieldSpec> {
        self.to_spec_at(None)
    }

    fn to_spec_at(&self, parent: Option<&str>) -> Result<ParquetFieldSpec> {
        let attrs = parse_tag(&self.tag);
        let here = |name: &str| match parent {
            Some(parent) => format!("{}.{}", parent, name),
            None => name.to_string(),
        };

        let name = match attrs.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(Error::invalid_schema(
                    here("<unnamed>"),
                    format!("tag `{}` has no name", self.tag),
                ))
            }
        };
        let path = here(&name);

        let physical_type = match attrs.physical_type.as_deref() {
            Some(ty) => PhysicalType::from_tag(ty).ok_or_else(|| {
                Error::unsupported_type(&path, format!("unknown physical type `{}`", ty))
            })?,
            None if !self.fields.is_empty() => PhysicalType::Group,
            None => {
                return Err(Error::invalid_schema(
                    &path,
                    "tag has neither a type nor nested fields",
                ))
            }
        };

        let repetition = match attrs.repetition.as_deref() {
            Some(rep) => Repetition::from_tag(rep).ok_or_else(|| {
                Error::invalid_schema(&path, format!("unknown repetition type `{}`", rep))
            })?,
            None => Repetition::Required,
        };

        let logical = match attrs.converted_type.as_deref() {
            Some(conv) => Some(
                LogicalAnnotation::from_tag(conv, self.format.as_deref()).ok_or_else(|| {
                    Error::unsupported_type(&path, format!("unknown converted type `{}`", conv))
                })?,
            ),
            None => None,
        };

        let children = self
            .fields
            .iter()
            .map(|field| field.to_spec_at(Some(&path)))
            .collect::<Result<Vec<_>>>()?;

        let expected_children = match physical_type {
            PhysicalType::List => Some(1),
            PhysicalType::Map => Some(2),
            PhysicalType::Group => None,
            _ => Some(0),
        };
        match expected_children {
            Some(n) if children.len() != n => {
                return Err(Error::invalid_schema(
                    &path,
                    format!(
                        "{} field must have {} nested field(s), found {}",
                        physical_type,
                        n,
                        children.len()
                    ),
                ))
            }
            None if children.is_empty() => {
                return Err(Error::invalid_schema(&path, "GROUP field has no nested fields"))
            }
            _ => {}
        }

        Ok(ParquetFieldSpec {
            name,
            in_name: attrs.in_name,
            physical_type,
            logical,
            repetition,
            children,
            metadata: FieldMetadata {
                description: self.description.clone(),
                enum_values: self.enum_values.clone(),
                opaque: self.opaque,
            },
        })
    }
}

/// Render the tag string of a single field
pub fn render_tag(spec: &ParquetFieldSpec) -> String {
    let mut parts = vec![format!("name={}", spec.name)];
    if let Some(in_name) = &spec.in_name {
        parts.push(format!("inname={}", in_name));
    }
    parts.push(format!("type={}", spec.physical_type));
    if let Some(logical) = spec.logical {
        parts.push(format!("convertedtype={}", logical.converted_type()));
    }
    parts.push(format!("repetitiontype={}", spec.repetition));
    parts.join(", ")
}

/// Parse a tag by position
///
/// `inname` is the only free-form value, so `name` is taken from the front,
/// `type`, `convertedtype` and `repetitiontype` from the back in render
/// order, and everything after `inname=` up to them is the original key.
/// Tags that do not follow the rendered layout fall back to a key scan.
fn parse_tag(tag: &str) -> TagAttributes {
    let mut attrs = TagAttributes::default();
    let mut parts: Vec<&str> = tag.split(", ").collect();

    if let Some(value) = parts.last().and_then(|p| attribute(p, "repetitiontype")) {
        attrs.repetition = Some(value.trim().to_string());
        parts.pop();
    }
    if let Some(value) = parts.last().and_then(|p| attribute(p, "convertedtype")) {
        attrs.converted_type = Some(value.trim().to_string());
        parts.pop();
    }
    if let Some(value) = parts.last().and_then(|p| attribute(p, "type")) {
        attrs.physical_type = Some(value.trim().to_string());
        parts.pop();
    }
    if let Some(value) = parts.first().and_then(|p| attribute(p, "name")) {
        attrs.name = Some(value.trim().to_string());
        parts.remove(0);
    }

    if let Some(value) = parts.first().and_then(|p| attribute(p, "inname")) {
        let rest = parts[1..].iter().copied();
        attrs.in_name = Some(std::iter::once(value).chain(rest).collect::<Vec<_>>().join(", "));
        return attrs;
    }

    for part in parts {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = Some(value.trim().to_string());
        match key.trim().to_ascii_lowercase().as_str() {
            "name" if attrs.name.is_none() => attrs.name = value,
            "inname" if attrs.in_name.is_none() => attrs.in_name = value,
            "type" if attrs.physical_type.is_none() => attrs.physical_type = value,
            "convertedtype" if attrs.converted_type.is_none() => attrs.converted_type = value,
            "repetitiontype" if attrs.repetition.is_none() => attrs.repetition = value,
            _ => {}
        }
    }

    attrs
}

/// Value of `part` when it is the attribute `key`
fn attribute<'a>(part: &'a str, key: &str) -> Option<&'a str> {
    part.split_once('=')
        .filter(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

/// Render a compiled spec as tag-tree JSON
pub fn to_json_string(spec: &ParquetFieldSpec) -> Result<String> {
    Ok(serde_json::to_string(&SchemaField::from_spec(spec))?)
}

/// Parse tag-tree JSON back into a compiled spec
pub fn from_json_str(text: &str) -> Result<ParquetFieldSpec> {
    let field: SchemaField = serde_json::from_str(text)?;
    field.to_spec()
}
