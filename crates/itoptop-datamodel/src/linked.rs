//! Linked-set resolution.
//!
//! An `AttributeLinkedSetIndirect` field models an N-to-N relation through a
//! joining ("lnk") class. Each entry records which class to create and which
//! two of its keys point at this schema and at the remote schema. Unlike
//! external fields these tables are not inherited.

use crate::cache::ResolutionCache;
use crate::document::{DocumentIndex, FieldKind, FieldNode};
use crate::error::{Malformation, ResolveError};
use crate::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkedSetLookup {
    pub linked_class: String,
    /// Key on `linked_class` pointing back at this schema.
    pub ext_key_to_me: FieldId,
    /// Key on `linked_class` pointing at the related schema.
    pub ext_key_to_remote: FieldId,
}

impl LinkedSetLookup {
    pub fn new(
        linked_class: impl Into<String>,
        ext_key_to_me: impl Into<String>,
        ext_key_to_remote: impl Into<String>,
    ) -> Self {
        Self {
            linked_class: linked_class.into(),
            ext_key_to_me: ext_key_to_me.into(),
            ext_key_to_remote: ext_key_to_remote.into(),
        }
    }
}

pub type LinkedSetTable = BTreeMap<FieldId, LinkedSetLookup>;

pub(crate) const LINKED_CLASS: &str = "linked_class";
pub(crate) const EXT_KEY_TO_ME: &str = "ext_key_to_me";
pub(crate) const EXT_KEY_TO_REMOTE: &str = "ext_key_to_remote";

pub(crate) fn resolve(
    index: &DocumentIndex,
    cache: &mut ResolutionCache,
    schema: &str,
) -> Result<Arc<LinkedSetTable>, ResolveError> {
    if let Some(table) = cache.linked(schema) {
        tracing::trace!(schema, "linked-set cache hit");
        return Ok(table);
    }

    let class = index
        .class(schema)
        .ok_or_else(|| ResolveError::UnknownSchema {
            schema: schema.to_string(),
        })?;

    let mut table = LinkedSetTable::new();
    for field in class.fields_of_kind(&FieldKind::LinkedSetIndirect) {
        table.insert(field.id.clone(), lookup_for(index, schema, field)?);
    }

    tracing::debug!(schema, entries = table.len(), "resolved linked sets");
    Ok(cache.store_linked(schema, table))
}

fn lookup_for(
    index: &DocumentIndex,
    schema: &str,
    field: &FieldNode,
) -> Result<LinkedSetLookup, ResolveError> {
    let required = move |name: &'static str| {
        field.child(name).ok_or_else(|| {
            ResolveError::malformed(schema, &field.id, Malformation::MissingChild(name))
        })
    };

    let linked_class = required(LINKED_CLASS)?;
    let ext_key_to_me = required(EXT_KEY_TO_ME)?;
    let ext_key_to_remote = required(EXT_KEY_TO_REMOTE)?;

    if !index.contains(linked_class) {
        return Err(ResolveError::malformed(
            schema,
            &field.id,
            Malformation::UnknownClass {
                attribute: LINKED_CLASS,
                class: linked_class.to_string(),
            },
        ));
    }

    Ok(LinkedSetLookup::new(
        linked_class,
        ext_key_to_me,
        ext_key_to_remote,
    ))
}
