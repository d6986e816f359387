//! Report compilation: configuration in, parameterized SQL out.
//!
//! ```text
//! ReportConfig
//!     │
//!     ├── required entities ──► JoinPathResolver ──► JOIN clauses
//!     ├── selected fields ────► aggregate::wrap ───► SELECT / GROUP BY
//!     ├── filters ────────────► filter::compile ───► WHERE (+ params)
//!     ├── time window ────────► time_range::resolve► WHERE (+ params)
//!     └── sorting / limit ────────────────────────► ORDER BY / LIMIT
//!                                                        │
//!                                                        ▼
//!                                                  CompiledQuery
//! ```
//!
//! The compiler is a pure function of the registry and the configuration.
//! It never touches a database; the caller binds `params` positionally to
//! the `$n` placeholders in `sql`.
//!
//! # Example
//!
//! ```
//! use quarry::planner::{compile_report, CompileOptions};
//! use quarry::report::ReportConfig;
//!
//! let config = ReportConfig::new("vehicles")
//!     .select("vehicles", "vehicle_label")
//!     .select("devices", "device_imei")
//!     .limit(50);
//!
//! let query = compile_report(&config, CompileOptions::default()).unwrap();
//! assert!(query.sql.ends_with("LIMIT 50"));
//! ```

pub mod aggregate;
mod assembler;
mod error;
pub mod filter;
mod ident;
pub mod join_path;
mod params;
pub mod preview;
pub mod time_range;
mod validate;

use serde::{Deserialize, Serialize};

pub use assembler::{compile_report, CompiledQuery, OutputColumn, ReportCompiler};
pub use error::{CompileError, CompileResult, ErrorKind};
pub use ident::{check_identifier, is_valid_identifier, qualify};
pub use join_path::{JoinPathResolver, JoinStep};
pub use params::ParamSink;
pub use time_range::TimeBounds;
pub use validate::{ValidationReport, ValidationWarning};

/// Hard cap on the emitted row limit.
pub const MAX_LIMIT: u64 = 10_000;

/// How join paths are searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Priority-ordered depth-first search. Stable output across versions.
    #[default]
    Priority,
    /// Breadth-first minimal-hop search.
    ShortestPath,
}

/// Which plain selections land in GROUP BY when a report aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupByPolicy {
    /// Only plain fields also named in the configuration's group-by list.
    #[default]
    Explicit,
    /// Every plain selected field, deduplicated.
    AllPlain,
}

/// Options for compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
    #[serde(default)]
    pub join_strategy: JoinStrategy,
    #[serde(default)]
    pub group_by: GroupByPolicy,
}

impl CompileOptions {
    pub fn with_join_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.join_strategy = strategy;
        self
    }

    pub fn with_group_by(mut self, policy: GroupByPolicy) -> Self {
        self.group_by = policy;
        self
    }
}
