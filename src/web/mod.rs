//! HTTP boundary for the report compiler.
//!
//! Enabled with the `server` feature.

#[cfg(feature = "server")]
mod server;

#[cfg(feature = "server")]
pub use server::*;
