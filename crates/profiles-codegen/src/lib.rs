//! profiles-codegen: binding generation for the OpenTelemetry profiles signal
//!
//! Features:
//! - Schema sources: pinned git checkout or an existing local tree
//! - Schema compilers: in-process tonic-build or prost-build, external protoc
//! - Sequential generation pipeline with layout normalization
//! - Generation manifest

pub mod compiler;
pub mod manifest;
pub mod pipeline;
pub mod source;
pub mod workdir;

pub use compiler::{ProstCompiler, ProtocCompiler, SchemaCompiler, TonicCompiler};
pub use manifest::{FamilyRecord, FileRecord, GenerationManifest, MANIFEST_FILE};
pub use pipeline::Pipeline;
pub use source::{Checkout, GitSource, LocalSource, SchemaSource};
pub use workdir::WorkDir;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::compiler::SchemaCompiler;
    pub use super::pipeline::Pipeline;
    pub use super::source::{GitSource, LocalSource, SchemaSource};
}
