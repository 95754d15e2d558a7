//! Schema catalog: every class id declared in the document.

use crate::document::DataModelDocument;
use crate::SchemaId;
use std::collections::HashSet;

/// Class ids in document order, first occurrence kept. Class nodes without an
/// `id` are not schemas and are skipped.
pub fn collect_schemas(document: &DataModelDocument) -> Vec<SchemaId> {
    let mut seen = HashSet::new();
    document
        .classes
        .iter()
        .filter_map(|class| class.id.as_deref())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}
