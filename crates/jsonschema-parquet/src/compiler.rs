//! JSON Schema to [`ParquetFieldSpec`] compilation
//!
//! The compiler is a pure recursive walk: it never mutates its input, keeps
//! no state between calls, and yields identical trees for identical
//! documents. Per-field failures are contained: in lenient mode (the default)
//! the failing field becomes an opaque, optional `BYTE_ARRAY/UTF8`
//! placeholder and the error is collected as a [`Diagnostic`]; in strict mode
//! the first error aborts the compile.

use crate::json_schema::{json_kind, JsonSchemaNode, SchemaDefinitionTable, SchemaDocument, SubSchema};
use crate::resolver::{RefResolver, Resolution};
use crate::schema::{FieldMetadata, ParquetFieldSpec, PhysicalType, Repetition};
use crate::type_mapper::{map_type, TypeMapping};
use crate::{Diagnostic, Error, Result};

/// Compiles JSON Schema documents into Parquet field trees
#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler {
    strict: bool,
}

/// The output of one compile
#[derive(Debug)]
pub struct Compilation {
    pub spec: ParquetFieldSpec,
    /// Warnings and contained errors, in the order they were found
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Error> {
        self.diagnostics
            .iter()
            .filter(|d| !d.is_error())
            .map(|d| &d.error)
    }

    pub fn into_spec(self) -> ParquetFieldSpec {
        self.spec
    }
}

/// How the field being compiled is addressed by its parent
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// The document root is always REQUIRED
    Root,
    /// A property, list element or map value; `optional` is the parent's say
    Member { optional: bool },
}

impl Slot {
    fn repetition(self, nullable: bool) -> Repetition {
        match self {
            Slot::Root => Repetition::Required,
            Slot::Member { optional } if optional || nullable => Repetition::Optional,
            Slot::Member { .. } => Repetition::Required,
        }
    }
}

impl SchemaCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort on the first error instead of substituting placeholders
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Compile a whole document under the given root name
    pub fn compile(&self, document: &SchemaDocument, name: &str) -> Result<Compilation> {
        self.compile_node(&document.root, &document.definitions, name)
    }

    /// Compile a node against an explicit definition table
    pub fn compile_node(
        &self,
        node: &JsonSchemaNode,
        table: &SchemaDefinitionTable,
        name: &str,
    ) -> Result<Compilation> {
        let mut walk = Walk {
            resolver: RefResolver::new(table),
            strict: self.strict,
            ref_stack: Vec::new(),
            diagnostics: Vec::new(),
        };
        let spec = walk.field(node, name, name, Slot::Root)?;

        tracing::debug!(
            root = name,
            diagnostics = walk.diagnostics.len(),
            "compiled JSON schema"
        );

        Ok(Compilation {
            spec,
            diagnostics: walk.diagnostics,
        })
    }
}

/// State of one compile: the resolver, the `$ref` pointers currently being
/// expanded, and the collected diagnostics
struct Walk<'a> {
    resolver: RefResolver<'a>,
    strict: bool,
    ref_stack: Vec<&'a str>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Walk<'a> {
    fn field(
        &mut self,
        node: &'a JsonSchemaNode,
        name: &str,
        path: &str,
        slot: Slot,
    ) -> Result<ParquetFieldSpec> {
        let resolution = match self.resolver.resolve(node, path) {
            Ok(resolution) => resolution,
            Err(err) => return self.fail(err, name),
        };

        let node = match resolution {
            Resolution::Inline(node) => node,
            Resolution::Unsupported { pointer, node } => {
                self.warn(Error::SchemaResolution {
                    path: path.to_string(),
                    reference: pointer.to_string(),
                    reason: "only `#/$defs/...` pointers are followed; the reference is ignored"
                        .to_string(),
                });
                node
            }
            Resolution::Resolved { pointer, node } => {
                if let Some(start) = self.ref_stack.iter().position(|p| *p == pointer) {
                    let mut cycle: Vec<String> =
                        self.ref_stack[start..].iter().map(|p| p.to_string()).collect();
                    cycle.push(pointer.to_string());
                    let err = Error::CyclicSchema {
                        path: path.to_string(),
                        reference: pointer.to_string(),
                        cycle,
                    };
                    return self.fail(err, name);
                }

                self.ref_stack.push(pointer);
                let compiled = self.field(node, name, path, slot);
                self.ref_stack.pop();
                return compiled;
            }
        };

        let repetition = slot.repetition(node.types.is_nullable());
        let metadata = FieldMetadata {
            description: node.description.clone(),
            enum_values: node.enum_values.clone(),
            opaque: false,
        };

        if !node.properties.is_empty() {
            let mut children: Vec<ParquetFieldSpec> = Vec::with_capacity(node.properties.len());
            for (property, subschema) in &node.properties {
                let child_path = format!("{}.{}", path, property);
                let slot = Slot::Member {
                    optional: !node.is_required(property),
                };
                let column = column_name(property);
                let mut child = self.subschema(subschema, &column, &child_path, slot)?;
                if column != *property {
                    child.in_name = Some(property.clone());
                }

                if children.iter().any(|c| c.name == child.name) {
                    let err = Error::invalid_schema(
                        child_path,
                        format!("column name `{}` is already used by a sibling", child.name),
                    );
                    if self.strict {
                        return Err(err);
                    }
                    self.diagnostics.push(Diagnostic::error(err));
                    continue;
                }
                children.push(child);
            }

            let mut group = ParquetFieldSpec::group(name, repetition, children);
            group.metadata = metadata;
            return Ok(group);
        }

        if let Some(items) = &node.items {
            let element_path = format!("{}.element", path);
            let element =
                self.subschema(items, "element", &element_path, Slot::Member { optional: false })?;
            let mut list = ParquetFieldSpec::list(name, repetition, element);
            list.metadata = metadata;
            return Ok(list);
        }

        if let Some(values) = &node.additional_properties {
            if node.types.is_empty() || node.types.carrier() == Some("object") {
                let key = ParquetFieldSpec::utf8("key", Repetition::Required);
                let value_path = format!("{}.value", path);
                let value =
                    self.subschema(values, "value", &value_path, Slot::Member { optional: false })?;
                let mut map = ParquetFieldSpec::map(name, repetition, key, value);
                map.metadata = metadata;
                return Ok(map);
            }
        }

        let mapping = match map_type(&node.types, node.format.as_deref(), path) {
            Ok(mapping) => mapping,
            Err(err) => return self.fail(err, name),
        };

        let mapping = if mapping.physical.is_nested() {
            // `array` without `items`, `object` without `properties`
            self.warn(Error::unsupported_type(
                path,
                format!(
                    "`{}` with nothing to describe its contents is stored as JSON text",
                    node.types.carrier().unwrap_or_default()
                ),
            ));
            TypeMapping::text_fallback(mapping.nullable)
        } else {
            if mapping.lossy {
                let detail = match node.types.carrier() {
                    Some(carrier) => format!(
                        "no Parquet mapping for type `{}`; values are stored as JSON text",
                        carrier
                    ),
                    None => "no type given; values are stored as JSON text".to_string(),
                };
                self.warn(Error::unsupported_type(path, detail));
            }
            mapping
        };

        let mut leaf = ParquetFieldSpec::leaf(name, mapping.physical, repetition);
        leaf.logical = mapping.logical;
        leaf.metadata = FieldMetadata {
            opaque: mapping.lossy,
            ..metadata
        };
        Ok(leaf)
    }

    fn subschema(
        &mut self,
        subschema: &'a SubSchema,
        name: &str,
        path: &str,
        slot: Slot,
    ) -> Result<ParquetFieldSpec> {
        match subschema {
            SubSchema::Node(node) => self.field(node, name, path, slot),
            SubSchema::Invalid(value) => {
                let err = Error::invalid_schema(
                    path,
                    format!("subschema must be a JSON object, got {}", json_kind(value)),
                );
                self.fail(err, name)
            }
        }
    }

    /// Contain an error: abort in strict mode, otherwise record it and
    /// substitute an opaque placeholder
    fn fail(&mut self, err: Error, name: &str) -> Result<ParquetFieldSpec> {
        if self.strict {
            return Err(err);
        }
        tracing::warn!(error = %err, "replacing field with an opaque placeholder");
        self.diagnostics.push(Diagnostic::error(err));
        Ok(placeholder(name))
    }

    fn warn(&mut self, err: Error) {
        tracing::warn!(error = %err, "lossy schema mapping");
        self.diagnostics.push(Diagnostic::warning(err));
    }
}

fn placeholder(name: &str) -> ParquetFieldSpec {
    let mut spec = ParquetFieldSpec::utf8(name, Repetition::Optional);
    spec.metadata.opaque = true;
    spec
}

/// Parquet column name for a JSON property
///
/// `,` and `=` would break the tag grammar, and surrounding whitespace does
/// not survive it.
fn column_name(property: &str) -> String {
    let trimmed = property.trim();
    if trimmed.is_empty() {
        return "_".to_string();
    }
    trimmed.replace([',', '='], "_")
}

/// Compile a document with default (lenient) options
pub fn compile(document: &SchemaDocument, name: &str) -> Result<Compilation> {
    SchemaCompiler::new().compile(document, name)
}
