use crate::ParquetFieldSpec;

/// Trait for schema introspection
///
/// Paths are column names joined by `.`, relative to the root. LIST elements
/// are reached through `element` and MAP entries through `key` and `value`,
/// matching the column names the compiler gives them.
pub trait SchemaInspector {
    /// Get the total number of fields (including nested)
    fn field_count(&self) -> usize;

    /// Get field by path (e.g., "address.city")
    fn get_field_by_path(&self, path: &str) -> Option<&ParquetFieldSpec>;

    /// Check if schema contains a specific field
    fn has_field(&self, name: &str) -> bool;

    /// Get all field paths in the schema
    fn all_field_paths(&self) -> Vec<String>;

    /// Paths of fields that compiled to the text fallback
    fn opaque_field_paths(&self) -> Vec<String>;
}

impl SchemaInspector for ParquetFieldSpec {
    fn field_count(&self) -> usize {
        count_fields(self)
    }

    fn get_field_by_path(&self, path: &str) -> Option<&ParquetFieldSpec> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.')
            .try_fold(self, |node, part| node.child(part))
    }

    fn has_field(&self, name: &str) -> bool {
        self.get_field_by_path(name).is_some()
    }

    fn all_field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for child in &self.children {
            collect_field_paths(child, String::new(), &mut paths, &|_| true);
        }
        paths
    }

    fn opaque_field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for child in &self.children {
            collect_field_paths(child, String::new(), &mut paths, &|f| f.metadata.opaque);
        }
        paths
    }
}

fn count_fields(node: &ParquetFieldSpec) -> usize {
    1 + node.children.iter().map(count_fields).sum::<usize>()
}

fn collect_field_paths(
    node: &ParquetFieldSpec,
    prefix: String,
    paths: &mut Vec<String>,
    keep: &dyn Fn(&ParquetFieldSpec) -> bool,
) {
    let current_path = if prefix.is_empty() {
        node.name.clone()
    } else {
        format!("{}.{}", prefix, node.name)
    };

    if keep(node) {
        paths.push(current_path.clone());
    }

    for child in &node.children {
        collect_field_paths(child, current_path.clone(), paths, keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldMetadata, PhysicalType, Repetition};

    fn schema() -> ParquetFieldSpec {
        ParquetFieldSpec::group(
            "root",
            Repetition::Required,
            vec![
                ParquetFieldSpec::leaf("id", PhysicalType::Int64, Repetition::Required),
                ParquetFieldSpec::group(
                    "address",
                    Repetition::Optional,
                    vec![ParquetFieldSpec::utf8("city", Repetition::Optional)],
                ),
                ParquetFieldSpec::list(
                    "tags",
                    Repetition::Optional,
                    ParquetFieldSpec::utf8("tag", Repetition::Required),
                ),
                ParquetFieldSpec::utf8("extra", Repetition::Optional).with_metadata(
                    FieldMetadata {
                        opaque: true,
                        ..Default::default()
                    },
                ),
            ],
        )
    }

    #[test]
    fn test_schema_inspector() {
        let schema = schema();

        // root, id, address, city, tags, element, extra
        assert_eq!(schema.field_count(), 7);

        assert!(schema.has_field("id"));
        assert!(schema.has_field("address"));
        assert!(schema.has_field("address.city"));
        assert!(schema.has_field("tags.element"));
        assert!(!schema.has_field("tags.tag"));
        assert!(!schema.has_field("missing"));

        let city = schema.get_field_by_path("address.city").unwrap();
        assert_eq!(city.name, "city");
        assert_eq!(schema.get_field_by_path("").unwrap().name, "root");
    }

    #[test]
    fn test_field_paths() {
        let schema = schema();
        assert_eq!(
            schema.all_field_paths(),
            vec!["id", "address", "address.city", "tags", "tags.element", "extra"]
        );
        assert_eq!(schema.opaque_field_paths(), vec!["extra"]);
    }
}
