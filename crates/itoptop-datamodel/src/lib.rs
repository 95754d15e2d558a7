//! iTop data-dictionary resolution engine
//!
//! Consumes a class-definition export (the CMDB data dictionary) and derives,
//! per class ("schema"), the two indirect-reference tables a client needs
//! before it can create or update objects through the REST API:
//!
//! - **External fields**: a denormalized display field (e.g. `parent_name`) is
//!   mapped back to the foreign key that must actually be submitted
//!   (`parent_id`), together with the schema/field the key points at.
//! - **Linked sets**: an N-to-N relation field is mapped to the joining class
//!   and the two keys that tie it to this schema and to the remote schema.
//!
//! ```text
//!   datamodel.xml ──► loader ──► DataModelDocument ──► DataModel (engine)
//!                                                        │  catalog (eager)
//!                                                        │  index   (eager)
//!                                                        ▼
//!                                     resolve_external_fields / resolve_linked_sets
//!                                              (lazy, cached per schema)
//! ```
//!
//! The engine never fetches, submits, or serializes records itself.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod external;
pub mod linked;
pub mod loader;

pub use cache::CacheStats;
pub use config::{EngineConfig, DEFAULT_ROOT_CLASS};
pub use document::{ClassNode, DataModelDocument, FieldKind, FieldNode};
pub use engine::DataModel;
pub use error::{LoadError, Malformation, ResolveError};
pub use external::{ExternalFieldLookup, ExternalFieldTable};
pub use linked::{LinkedSetLookup, LinkedSetTable};
pub use loader::{load_path, load_str};

/// Schema (class) identifier.
pub type SchemaId = String;

/// Field identifier, unique within its declaring class.
pub type FieldId = String;
