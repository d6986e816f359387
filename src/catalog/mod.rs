//! Entity catalog: the declared record types a report can draw from.
//!
//! The catalog is pure configuration data. It is loaded once from a TOML
//! document into an [`EntityRegistry`] and never changes afterwards.
//!
//! ```toml
//! version = "2024.1"
//!
//! [[entities]]
//! id = "vehicles"
//! schema_name = "raw_business_data"
//! table_name = "vehicles"
//!
//! [[entities.fields]]
//! id = "vehicle_id"
//! type = "number"
//! primary_key = true
//!
//! [[entities.relationships]]
//! target = "objects"
//! type = "one-to-one"
//! source_field = "object_id"
//! target_field = "object_id"
//! ```

pub mod graph;
mod registry;
pub mod types;

pub use graph::{Direction, EdgeData, RelationshipGraph};
pub use registry::{CatalogError, CatalogResult, EntityRegistry};
pub use types::{
    AggregationKind, Cardinality, Entity, EntityCategory, Field, FieldType, ForeignRef, JoinKind,
    Relationship,
};
