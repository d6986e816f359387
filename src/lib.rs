//! # Quarry
//!
//! Compiles declarative report configurations into parameterized SQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Catalog (entities, fields, relationships)     │
//! │            loaded once from a versioned TOML document    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [registry + relationship graph]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ReportConfig (fields, filters, sort, window)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │   join paths · filters · aggregates · time bounds        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [assembler]
//! ┌─────────────────────────────────────────────────────────┐
//! │         SQL text with $n placeholders + params           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Quarry never runs the SQL it produces. Executing a [`CompiledQuery`]
//! means binding `params[i]` to `$(i + 1)` in whatever driver the caller uses.

pub mod catalog;
pub mod config;
pub mod planner;
pub mod report;
pub mod store;

#[cfg(feature = "server")]
pub mod web;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::catalog::{
        AggregationKind, Cardinality, Entity, EntityRegistry, Field, FieldType, JoinKind,
        Relationship,
    };
    pub use crate::planner::{
        compile_report, CompileError, CompileOptions, CompiledQuery, GroupByPolicy, JoinStrategy,
        ReportCompiler,
    };
    pub use crate::report::{
        FilterCondition, FilterOperator, ReportConfig, ReportRequest, SelectedField,
        SortDirection, TimeRange,
    };
}

pub use catalog::EntityRegistry;
pub use planner::{compile_report, CompileError, CompileOptions, CompiledQuery, ReportCompiler};
pub use report::ReportConfig;
