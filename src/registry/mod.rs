//! Source registry and its durable backing document
//!
//! - [`RegistryDocument`] / [`SourceRecord`]: the on-disk JSON shape
//! - [`ConfigStore`]: lenient load, atomic save of that document
//! - [`SourceRegistry`]: the authoritative in-memory view, keyed by source id

mod document;
mod source_registry;
mod store;

pub use document::{RegistryDocument, SourceRecord};
pub use source_registry::{
    build_source_record, build_source_record_at, source_id_for, CreatedAtPolicy, RegistryPolicy,
    SourceOrdering, SourceRegistry, SOURCE_ID_PREFIX,
};
pub use store::ConfigStore;

pub(crate) use store::write_json_atomically;
