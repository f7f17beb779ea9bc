//! Core types for profiles-proto
//!
//! # Modules
//!
//! - `config`: Layered settings (defaults, environment file, TOML, env vars)
//! - `error`: Error type and Result alias
//! - `markers`: Package tree preparation and package markers
//! - `resolver`: Current/legacy schema layout resolution and output normalization
//! - `schema`: Static catalog of the schemas a run compiles

pub mod config;
pub mod error;
pub mod markers;
pub mod resolver;
pub mod schema;

// Re-exports
pub use self::config::{CompilerKind, Settings};
pub use error::{Error, Result};
pub use markers::PackageMarker;
pub use resolver::{normalize_output_layout, resolve, ResolutionResult, SchemaResolver};
pub use schema::{SchemaFamily, COLLECTOR_PROFILES, PROFILES, SCHEMA_FAMILIES};
