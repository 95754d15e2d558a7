//! Per-engine memoization of resolution tables.
//!
//! Tables are immutable once computed, so entries are never evicted. The
//! engine keeps one [`ResolutionCache`] behind a single lock.

use crate::external::ExternalFieldTable;
use crate::linked::LinkedSetTable;
use crate::SchemaId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Counters for observing cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Schemas whose external-field table was computed (cache misses).
    pub external_field_computations: usize,
    /// Schemas whose linked-set table was computed (cache misses).
    pub linked_set_computations: usize,
    /// Lookups answered from either map, including ancestor lookups made
    /// during inheritance merges.
    pub hits: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ResolutionCache {
    external: HashMap<SchemaId, Arc<ExternalFieldTable>>,
    linked: HashMap<SchemaId, Arc<LinkedSetTable>>,
    stats: CacheStats,
}

impl ResolutionCache {
    pub fn external(&mut self, schema: &str) -> Option<Arc<ExternalFieldTable>> {
        let hit = self.external.get(schema).cloned();
        if hit.is_some() {
            self.stats.hits += 1;
        }
        hit
    }

    pub fn store_external(
        &mut self,
        schema: &str,
        table: ExternalFieldTable,
    ) -> Arc<ExternalFieldTable> {
        let table = Arc::new(table);
        self.stats.external_field_computations += 1;
        self.external.insert(schema.to_string(), Arc::clone(&table));
        table
    }

    pub fn linked(&mut self, schema: &str) -> Option<Arc<LinkedSetTable>> {
        let hit = self.linked.get(schema).cloned();
        if hit.is_some() {
            self.stats.hits += 1;
        }
        hit
    }

    pub fn store_linked(&mut self, schema: &str, table: LinkedSetTable) -> Arc<LinkedSetTable> {
        let table = Arc::new(table);
        self.stats.linked_set_computations += 1;
        self.linked.insert(schema.to_string(), Arc::clone(&table));
        table
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_then_hit() {
        let mut cache = ResolutionCache::default();
        assert!(cache.external("Person").is_none());

        let stored = cache.store_external("Person", ExternalFieldTable::new());
        let hit = cache.external("Person").unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));

        assert_eq!(
            cache.stats(),
            CacheStats {
                external_field_computations: 1,
                linked_set_computations: 0,
                hits: 1,
            }
        );
    }

    #[test]
    fn test_maps_are_independent() {
        let mut cache = ResolutionCache::default();
        cache.store_linked("Ticket", LinkedSetTable::new());
        assert!(cache.external("Ticket").is_none());
        assert!(cache.linked("Ticket").is_some());
    }
}
