//! Schema catalog
//!
//! The upstream `opentelemetry-proto` repository has published the profiles
//! signal under two directory names over its history: `v1experimental` and,
//! later, `v1development`. Each [`SchemaFamily`] names both candidates so the
//! resolver can pick whichever one a given checkout actually contains.

use std::path::{Path, PathBuf};

/// Upstream schema repository
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/open-telemetry/opentelemetry-proto.git";

/// Pinned upstream commit (February 11, 2025)
pub const DEFAULT_COMMIT: &str = "ae87ce7c56e5fd356b77097b1d9a655ff00aa24f";

/// Top-level directory of the generated package tree
pub const PACKAGE_ROOT: &str = "opentelemetry";

/// A logical group of schemas whose location depends on the upstream revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaFamily {
    pub name: &'static str,
    pub legacy_relative_path: &'static str,
    pub current_relative_path: &'static str,
}

/// Profiling data schema
pub const PROFILES: SchemaFamily = SchemaFamily {
    name: "profiles",
    legacy_relative_path: "opentelemetry/proto/profiles/v1experimental/profiles.proto",
    current_relative_path: "opentelemetry/proto/profiles/v1development/profiles.proto",
};

/// Profiling collector service schema
pub const COLLECTOR_PROFILES: SchemaFamily = SchemaFamily {
    name: "collector_profiles",
    legacy_relative_path: "opentelemetry/proto/collector/profiles/v1experimental/profiles_service.proto",
    current_relative_path: "opentelemetry/proto/collector/profiles/v1development/profiles_service.proto",
};

/// Every family resolved by a run, in compilation order
pub const SCHEMA_FAMILIES: &[SchemaFamily] = &[PROFILES, COLLECTOR_PROFILES];

/// Schemas the profiles families import; their location never moved.
pub const DEPENDENCY_SCHEMAS: &[&str] = &[
    "opentelemetry/proto/common/v1/common.proto",
    "opentelemetry/proto/resource/v1/resource.proto",
];

/// Leaf directories of the canonical package tree
pub const CANONICAL_PACKAGES: &[&str] = &[
    "opentelemetry/proto/profiles/v1development",
    "opentelemetry/proto/collector/profiles/v1development",
    "opentelemetry/proto/common/v1",
    "opentelemetry/proto/resource/v1",
];

impl SchemaFamily {
    /// Current-layout candidate under `repo_root`
    pub fn current_candidate(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(self.current_relative_path)
    }

    /// Legacy-layout candidate under `repo_root`
    pub fn legacy_candidate(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(self.legacy_relative_path)
    }

    /// Output directory the rest of the package expects, relative to the output root.
    ///
    /// Generators mirror the schema's package path, so this is the parent of
    /// the current-layout schema.
    pub fn canonical_output_dir(&self) -> &'static Path {
        parent_dir(self.current_relative_path)
    }

    /// Output directory a generator writes to when fed the legacy schema.
    pub fn legacy_output_dir(&self) -> &'static Path {
        parent_dir(self.legacy_relative_path)
    }
}

fn parent_dir(relative: &'static str) -> &'static Path {
    Path::new(relative).parent().unwrap_or_else(|| Path::new(""))
}

/// Every directory of the canonical package tree, ancestors included, sorted
/// so that parents come before their children.
pub fn package_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for leaf in CANONICAL_PACKAGES {
        for ancestor in Path::new(leaf).ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            dirs.push(ancestor.to_path_buf());
        }
    }
    dirs.sort();
    dirs.dedup();
    dirs
}

/// Absolute paths of the dependency schemas under `repo_root`
pub fn dependency_schemas(repo_root: &Path) -> Vec<PathBuf> {
    DEPENDENCY_SCHEMAS
        .iter()
        .map(|relative| repo_root.join(relative))
        .collect()
}
