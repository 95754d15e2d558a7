//! External-field resolution.
//!
//! An external field (`AttributeExternalField`) displays a value reached
//! through a key field on the same class. To write it, a client must submit
//! the key instead, so for every external field we record:
//!
//! ```text
//!   field -> (extkey_attcode, schema the key points at, target_attcode)
//! ```
//!
//! When the key is an `AttributeHierarchicalKey` the key points back at the
//! class itself. Tables are merged down the single-inheritance chain: a copy
//! of the parent's table overlaid with the class's own entries.

use crate::cache::ResolutionCache;
use crate::config::EngineConfig;
use crate::document::{ClassEntry, DocumentIndex, FieldKind, FieldNode};
use crate::error::{Malformation, ResolveError};
use crate::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalFieldLookup {
    /// Key field to submit in place of the external field.
    pub key: FieldId,
    /// Schema the key refers to.
    pub target_schema: String,
    /// Field on `target_schema` whose value the external field displays.
    pub target_field: FieldId,
}

impl ExternalFieldLookup {
    pub fn new(
        key: impl Into<String>,
        target_schema: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            target_schema: target_schema.into(),
            target_field: target_field.into(),
        }
    }
}

pub type ExternalFieldTable = BTreeMap<FieldId, ExternalFieldLookup>;

pub(crate) const EXTKEY_ATTCODE: &str = "extkey_attcode";
pub(crate) const TARGET_ATTCODE: &str = "target_attcode";
pub(crate) const TARGET_CLASS: &str = "target_class";

/// Resolve through the cache.
///
/// Walks up the parent chain until it reaches the root class, a schema
/// without a parent, or an ancestor whose table is already cached, then folds
/// the local tables back down, caching each level on the way.
pub(crate) fn resolve(
    index: &DocumentIndex,
    config: &EngineConfig,
    cache: &mut ResolutionCache,
    schema: &str,
) -> Result<Arc<ExternalFieldTable>, ResolveError> {
    if let Some(table) = cache.external(schema) {
        tracing::trace!(schema, "external-field cache hit");
        return Ok(table);
    }

    // Uncached schemas, `schema` first, each followed by its parent.
    let mut chain: Vec<(&str, &ClassEntry)> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut inherited: Option<Arc<ExternalFieldTable>> = None;
    let mut current = schema;

    loop {
        if !seen.insert(current) {
            let mut cycle: Vec<String> = chain.iter().map(|(s, _)| s.to_string()).collect();
            cycle.push(current.to_string());
            return Err(ResolveError::InheritanceCycle {
                schema: current.to_string(),
                chain: cycle,
            });
        }

        let class = index
            .class(current)
            .ok_or_else(|| ResolveError::UnknownSchema {
                schema: current.to_string(),
            })?;
        chain.push((current, class));

        let Some(parent) = class
            .parent
            .as_deref()
            .filter(|parent| !config.is_root(parent))
        else {
            break;
        };

        if !index.contains(parent) {
            return Err(ResolveError::MalformedDocument {
                schema: current.to_string(),
                field: None,
                problem: Malformation::UnknownParent(parent.to_string()),
            });
        }
        if let Some(table) = cache.external(parent) {
            inherited = Some(table);
            break;
        }
        current = parent;
    }

    for &(name, class) in chain.iter().rev() {
        let local = local_table(index, name, class)?;
        let table = match inherited.take() {
            None => local,
            Some(parent_table) => {
                tracing::debug!(
                    schema = name,
                    inherited = parent_table.len(),
                    local = local.len(),
                    "merging inherited external fields"
                );
                let mut merged = (*parent_table).clone();
                merged.extend(local);
                merged
            }
        };
        tracing::debug!(schema = name, entries = table.len(), "resolved external fields");
        inherited = Some(cache.store_external(name, table));
    }

    inherited.ok_or_else(|| ResolveError::UnknownSchema {
        schema: schema.to_string(),
    })
}

/// External fields declared on `schema` itself, ancestors excluded.
fn local_table(
    index: &DocumentIndex,
    schema: &str,
    class: &ClassEntry,
) -> Result<ExternalFieldTable, ResolveError> {
    let mut table = ExternalFieldTable::new();
    for field in class.fields_of_kind(&FieldKind::ExternalField) {
        let lookup = lookup_for(index, schema, class, field)?;
        table.insert(field.id.clone(), lookup);
    }
    Ok(table)
}

fn lookup_for(
    index: &DocumentIndex,
    schema: &str,
    class: &ClassEntry,
    field: &FieldNode,
) -> Result<ExternalFieldLookup, ResolveError> {
    let required = move |name: &'static str| {
        field.child(name).ok_or_else(|| {
            ResolveError::malformed(schema, &field.id, Malformation::MissingChild(name))
        })
    };

    let key = required(EXTKEY_ATTCODE)?;
    let target_field = required(TARGET_ATTCODE)?;

    let key_field = class.field(key).ok_or_else(|| {
        ResolveError::malformed(
            schema,
            &field.id,
            Malformation::UnknownKeyField(key.to_string()),
        )
    })?;

    let target_schema = if key_field.kind() == FieldKind::HierarchicalKey {
        schema
    } else {
        let target_class = key_field.child(TARGET_CLASS).ok_or_else(|| {
            ResolveError::malformed(
                schema,
                &key_field.id,
                Malformation::MissingChild(TARGET_CLASS),
            )
        })?;
        if !index.contains(target_class) {
            return Err(ResolveError::malformed(
                schema,
                &key_field.id,
                Malformation::UnknownClass {
                    attribute: TARGET_CLASS,
                    class: target_class.to_string(),
                },
            ));
        }
        target_class
    };

    Ok(ExternalFieldLookup::new(key, target_schema, target_field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ClassNode, DataModelDocument};

    fn external(id: &str, key: &str, target: &str) -> FieldNode {
        FieldNode::new(id, "AttributeExternalField")
            .with_child(EXTKEY_ATTCODE, key)
            .with_child(TARGET_ATTCODE, target)
    }

    fn resolve_in(
        doc: DataModelDocument,
        schema: &str,
    ) -> Result<Arc<ExternalFieldTable>, ResolveError> {
        let index = DocumentIndex::build(doc);
        let mut cache = ResolutionCache::default();
        resolve(&index, &EngineConfig::default(), &mut cache, schema)
    }

    #[test]
    fn test_hierarchical_key_targets_own_schema() {
        let doc = DataModelDocument::new(vec![ClassNode::new("Organization")
            .with_parent("cmdbAbstractObject")
            .with_field(FieldNode::new("parent_id", "AttributeHierarchicalKey"))
            .with_field(external("parent_name", "parent_id", "name"))]);

        let table = resolve_in(doc, "Organization").unwrap();
        assert_eq!(
            table["parent_name"],
            ExternalFieldLookup::new("parent_id", "Organization", "name")
        );
    }

    #[test]
    fn test_external_key_uses_target_class() {
        let doc = DataModelDocument::new(vec![
            ClassNode::new("Organization"),
            ClassNode::new("Person")
                .with_field(
                    FieldNode::new("org_id", "AttributeExternalKey")
                        .with_child(TARGET_CLASS, "Organization"),
                )
                .with_field(external("org_name", "org_id", "name")),
        ]);

        let table = resolve_in(doc, "Person").unwrap();
        assert_eq!(
            table["org_name"],
            ExternalFieldLookup::new("org_id", "Organization", "name")
        );
    }

    #[test]
    fn test_missing_target_class_is_malformed() {
        let doc = DataModelDocument::new(vec![ClassNode::new("Person")
            .with_field(FieldNode::new("org_id", "AttributeExternalKey"))
            .with_field(external("org_name", "org_id", "name"))]);

        let err = resolve_in(doc, "Person").unwrap_err();
        assert_eq!(
            err,
            ResolveError::malformed("Person", "org_id", Malformation::MissingChild(TARGET_CLASS))
        );
    }

    #[test]
    fn test_unknown_key_field_is_malformed() {
        let doc = DataModelDocument::new(vec![
            ClassNode::new("Person").with_field(external("org_name", "org_id", "name"))
        ]);

        let err = resolve_in(doc, "Person").unwrap_err();
        assert_eq!(
            err,
            ResolveError::malformed(
                "Person",
                "org_name",
                Malformation::UnknownKeyField("org_id".to_string())
            )
        );
    }

    #[test]
    fn test_unknown_parent_is_malformed() {
        let doc = DataModelDocument::new(vec![ClassNode::new("Person").with_parent("Contact")]);

        let err = resolve_in(doc, "Person").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MalformedDocument {
                field: None,
                problem: Malformation::UnknownParent(ref p),
                ..
            } if p == "Contact"
        ));
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let doc = DataModelDocument::new(vec![ClassNode::new("Loop").with_parent("Loop")]);

        let err = resolve_in(doc, "Loop").unwrap_err();
        assert_eq!(
            err,
            ResolveError::InheritanceCycle {
                schema: "Loop".to_string(),
                chain: vec!["Loop".to_string(), "Loop".to_string()],
            }
        );
    }
}
