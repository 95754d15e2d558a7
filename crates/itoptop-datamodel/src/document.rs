//! Typed data-dictionary model and its lookup index.
//!
//! [`DataModelDocument`] is what the loader produces: class nodes in document
//! order, each with the field nodes found in its subtree. [`DocumentIndex`] is
//! built once from it so resolution never walks the tree again.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

// ============================================================================
// Nodes
// ============================================================================

/// Field type tag, as far as resolution cares about it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    ExternalField,
    LinkedSetIndirect,
    HierarchicalKey,
    ExternalKey,
    Other(String),
    Untyped,
}

impl FieldKind {
    /// Parse a raw type tag. Exports spell tags `AttributeExternalField`;
    /// the bare `ExternalField` form is accepted too.
    pub fn from_tag(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return FieldKind::Untyped;
        };
        match tag.strip_prefix("Attribute").unwrap_or(tag) {
            "ExternalField" => FieldKind::ExternalField,
            "LinkedSetIndirect" => FieldKind::LinkedSetIndirect,
            "HierarchicalKey" => FieldKind::HierarchicalKey,
            "ExternalKey" => FieldKind::ExternalKey,
            _ => FieldKind::Other(tag.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNode {
    pub id: String,
    /// Raw type tag (`xsi:type` in exports).
    pub field_type: Option<String>,
    /// Direct child element name -> trimmed text.
    pub children: HashMap<String, String>,
}

impl FieldNode {
    pub fn new(id: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type: Some(field_type.into()),
            children: HashMap::new(),
        }
    }

    pub fn untyped(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type: None,
            children: HashMap::new(),
        }
    }

    pub fn with_child(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.children.insert(name.into(), value.into());
        self
    }

    pub fn kind(&self) -> FieldKind {
        FieldKind::from_tag(self.field_type.as_deref())
    }

    /// Child text, treating an empty element as absent.
    pub fn child(&self, name: &str) -> Option<&str> {
        self.children
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    /// `None` for class elements without an `id` attribute; those are not
    /// usable schemas.
    pub id: Option<String>,
    pub parent: Option<String>,
    pub fields: Vec<FieldNode>,
}

impl ClassNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_field(mut self, field: FieldNode) -> Self {
        self.fields.push(field);
        self
    }
}

/// Parsed data dictionary. Class nodes are kept in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataModelDocument {
    pub classes: Vec<ClassNode>,
}

impl DataModelDocument {
    pub fn new(classes: Vec<ClassNode>) -> Self {
        Self { classes }
    }
}

// ============================================================================
// Index
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct ClassEntry {
    pub parent: Option<String>,
    /// Distinct field ids in first-declaration order.
    pub field_order: Vec<String>,
    pub fields: HashMap<String, FieldNode>,
}

impl ClassEntry {
    pub fn field(&self, id: &str) -> Option<&FieldNode> {
        self.fields.get(id)
    }

    /// Fields of the given kind, deduplicated by id.
    pub fn fields_of_kind<'a>(
        &'a self,
        kind: &'a FieldKind,
    ) -> impl Iterator<Item = &'a FieldNode> + 'a {
        self.field_order
            .iter()
            .filter_map(|id| self.fields.get(id))
            .filter(move |f| &f.kind() == kind)
    }
}

/// schema id -> class entry, and through it (schema id, field id) -> field.
#[derive(Debug, Default)]
pub(crate) struct DocumentIndex {
    classes: HashMap<String, ClassEntry>,
}

impl DocumentIndex {
    /// Class nodes sharing an id are folded together: the first declared
    /// parent wins and field sets are unioned. Within a class the first
    /// declaration of a field id wins.
    pub fn build(document: DataModelDocument) -> Self {
        let mut classes: HashMap<String, ClassEntry> = HashMap::new();
        for class in document.classes {
            let Some(id) = class.id else {
                continue;
            };
            let entry = classes.entry(id).or_default();
            if entry.parent.is_none() {
                entry.parent = class.parent.filter(|p| !p.is_empty());
            }
            for field in class.fields {
                if let Entry::Vacant(slot) = entry.fields.entry(field.id.clone()) {
                    entry.field_order.push(field.id.clone());
                    slot.insert(field);
                }
            }
        }
        Self { classes }
    }

    pub fn class(&self, id: &str) -> Option<&ClassEntry> {
        self.classes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.classes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}
