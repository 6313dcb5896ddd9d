//! `$ref` resolution against a document's definition table
//!
//! Only local pointers of the form `#/$defs/<segment>[/<segment>...]` are
//! followed. The first segment names an entry of the top-level table; each
//! further segment is looked up in the previous definition's own `$defs`, then
//! in its `properties`. Any other pointer syntax is reported as
//! [`Resolution::Unsupported`] and the referring node is used as-is.
//!
//! Cycle detection is the caller's job: the compiler keeps the stack of
//! pointers it is currently expanding and checks [`Resolution::Resolved`]
//! pointers against it.

use crate::json_schema::{json_kind, JsonSchemaNode, SchemaDefinitionTable, SubSchema};
use crate::{Error, Result};

const DEFS_PREFIX: &str = "#/$defs/";

/// Outcome of resolving one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// The node has no `$ref`
    Inline(&'a JsonSchemaNode),
    /// The node's `$ref` pointed at a definition
    Resolved {
        /// Canonical pointer of the definition, used as the cycle key
        pointer: &'a str,
        node: &'a JsonSchemaNode,
    },
    /// The `$ref` uses a syntax this resolver does not follow
    Unsupported {
        pointer: &'a str,
        node: &'a JsonSchemaNode,
    },
}

impl<'a> Resolution<'a> {
    /// The node to compile after resolution
    pub fn node(&self) -> &'a JsonSchemaNode {
        match *self {
            Resolution::Inline(node) => node,
            Resolution::Resolved { node, .. } => node,
            Resolution::Unsupported { node, .. } => node,
        }
    }
}

/// Resolves `$ref` pointers against a [`SchemaDefinitionTable`]
#[derive(Debug, Clone, Copy)]
pub struct RefResolver<'a> {
    table: &'a SchemaDefinitionTable,
}

impl<'a> RefResolver<'a> {
    pub fn new(table: &'a SchemaDefinitionTable) -> Self {
        Self { table }
    }

    /// Resolve one level of `$ref` on `node`
    ///
    /// `path` is the dotted field path used in error messages.
    pub fn resolve(&self, node: &'a JsonSchemaNode, path: &str) -> Result<Resolution<'a>> {
        let Some(pointer) = node.reference.as_deref() else {
            return Ok(Resolution::Inline(node));
        };
        let Some(rest) = pointer.strip_prefix(DEFS_PREFIX) else {
            return Ok(Resolution::Unsupported { pointer, node });
        };

        let fail = |reason: String| Error::SchemaResolution {
            path: path.to_string(),
            reference: pointer.to_string(),
            reason,
        };

        let mut current: Option<&'a JsonSchemaNode> = None;
        for raw in rest.split('/') {
            let segment = unescape_segment(raw);
            if segment.is_empty() {
                return Err(fail("empty pointer segment".to_string()));
            }

            let found = match current {
                None => self.table.get(&segment),
                Some(parent) => parent
                    .nested_definition(&segment)
                    .or_else(|| parent.properties.get(&segment)),
            };

            current = match found {
                Some(SubSchema::Node(def)) => Some(&**def),
                Some(SubSchema::Invalid(value)) => {
                    return Err(fail(format!(
                        "definition `{}` is a {}, not a schema object",
                        segment,
                        json_kind(value)
                    )))
                }
                None => return Err(fail(format!("definition `{}` not found", segment))),
            };
        }

        match current {
            Some(resolved) => Ok(Resolution::Resolved {
                pointer,
                node: resolved,
            }),
            None => Err(fail("pointer names no definition".to_string())),
        }
    }
}

/// Undo JSON Pointer escaping (`~1` is `/`, `~0` is `~`)
fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
