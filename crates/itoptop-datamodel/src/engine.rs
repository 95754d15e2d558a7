//! The resolution engine.
//!
//! A [`DataModel`] owns one loaded document for its whole lifetime. The
//! catalog and index are built eagerly; resolution tables are computed on
//! first request and cached until the engine is dropped.
//!
//! The engine is `Send + Sync`. Both caches sit behind one mutex and each
//! public resolver call holds it for the whole resolution, ancestors
//! included, so a schema's table is computed at most once even with
//! concurrent callers.

use crate::cache::{CacheStats, ResolutionCache};
use crate::catalog::collect_schemas;
use crate::config::EngineConfig;
use crate::document::{DataModelDocument, DocumentIndex};
use crate::error::{LoadError, ResolveError};
use crate::external::{self, ExternalFieldTable};
use crate::linked::{self, LinkedSetTable};
use crate::{loader, SchemaId};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

pub struct DataModel {
    config: EngineConfig,
    schemas: Vec<SchemaId>,
    index: DocumentIndex,
    cache: Mutex<ResolutionCache>,
}

impl DataModel {
    pub fn new(document: DataModelDocument) -> Self {
        Self::with_config(document, EngineConfig::default())
    }

    pub fn with_config(document: DataModelDocument, config: EngineConfig) -> Self {
        let schemas = collect_schemas(&document);
        let index = DocumentIndex::build(document);
        tracing::debug!(
            schemas = schemas.len(),
            indexed = index.len(),
            root_class = %config.root_class,
            "data model indexed"
        );
        Self {
            config,
            schemas,
            index,
            cache: Mutex::new(ResolutionCache::default()),
        }
    }

    /// Load an export from disk and build an engine over it.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, LoadError> {
        let document = loader::load_path(path)?;
        Ok(Self::with_config(document, config))
    }

    /// Every schema id in the document, in document order.
    pub fn list_schemas(&self) -> &[SchemaId] {
        &self.schemas
    }

    pub fn contains_schema(&self, schema: &str) -> bool {
        self.index.contains(schema)
    }

    /// External-field table for `schema`, including entries inherited from
    /// ancestors up to (excluding) the configured root class.
    pub fn resolve_external_fields(
        &self,
        schema: &str,
    ) -> Result<Arc<ExternalFieldTable>, ResolveError> {
        let mut cache = self.cache.lock();
        external::resolve(&self.index, &self.config, &mut cache, schema)
    }

    /// Linked-set table for `schema`. Never includes ancestors' entries.
    pub fn resolve_linked_sets(&self, schema: &str) -> Result<Arc<LinkedSetTable>, ResolveError> {
        let mut cache = self.cache.lock();
        linked::resolve(&self.index, &mut cache, schema)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }
}

impl std::fmt::Debug for DataModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModel")
            .field("root_class", &self.config.root_class)
            .field("schemas", &self.schemas.len())
            .field("cache", &self.cache_stats())
            .finish()
    }
}
