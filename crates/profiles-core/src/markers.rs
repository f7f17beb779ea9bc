//! Package tree preparation and package markers
//!
//! Every directory of the generated tree gets a marker so the output can be
//! consumed as a package: an empty file for languages that only need one to
//! exist (e.g. `__init__.py`), or a Rust `mod.rs` that declares the child
//! packages and includes the generated sources.

use glob::{glob, Pattern};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema::{package_dirs, PACKAGE_ROOT};

/// Name of the Rust module index written into each package directory
pub const RUST_MODULE_FILE: &str = "mod.rs";

const RUST_MODULE_HEADER: &str = "// @generated by profiles-proto. Do not edit.\n";

/// How a directory is marked as a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageMarker {
    /// Empty file with the given name
    Empty(String),
    /// `mod.rs` declaring child modules and including generated `.rs` files
    RustModule,
}

impl PackageMarker {
    /// Parse a marker setting: `rust` selects [`PackageMarker::RustModule`],
    /// anything else is the name of an empty marker file.
    pub fn from_setting(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("rust") {
            return Ok(PackageMarker::RustModule);
        }
        if value.is_empty() || value.contains('/') || value.contains('\\') {
            return Err(Error::config(format!(
                "invalid package marker file name: '{}'",
                value
            )));
        }
        Ok(PackageMarker::Empty(value.to_string()))
    }

    pub fn file_name(&self) -> &str {
        match self {
            PackageMarker::Empty(name) => name,
            PackageMarker::RustModule => RUST_MODULE_FILE,
        }
    }

    /// Write the marker into `dir` and return its path
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        let contents = match self {
            PackageMarker::Empty(_) => String::new(),
            PackageMarker::RustModule => rust_module_index(dir)?,
        };
        fs::write(&path, contents).map_err(|e| {
            Error::layout(format!("failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }
}

impl fmt::Display for PackageMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageMarker::Empty(name) => write!(f, "{}", name),
            PackageMarker::RustModule => write!(f, "rust"),
        }
    }
}

/// Create every directory of the canonical package tree under `output_root`.
pub fn prepare_package_tree(output_root: &Path) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for relative in package_dirs() {
        let dir = output_root.join(&relative);
        fs::create_dir_all(&dir).map_err(|e| {
            Error::layout(format!("failed to create {}: {}", dir.display(), e))
        })?;
        created.push(dir);
    }
    debug!(
        "Prepared {} package directories under {}",
        created.len(),
        output_root.display()
    );
    Ok(created)
}

/// Remove the package tree a previous run left under `output_root`.
///
/// Stale sources from another layout or compiler would otherwise end up in
/// the markers and the manifest. Returns whether a tree was removed.
pub fn clear_package_tree(output_root: &Path) -> Result<bool> {
    let package_root = output_root.join(PACKAGE_ROOT);
    if !package_root.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(&package_root).map_err(|e| {
        Error::layout(format!("failed to remove {}: {}", package_root.display(), e))
    })?;
    debug!("Removed previous package tree {}", package_root.display());
    Ok(true)
}

/// Write `marker` into every directory of the package tree under `output_root`.
///
/// Covers the canonical directories and anything the generator added beside
/// them (such as a legacy `v1experimental` directory). With the Rust marker a
/// root `mod.rs` declaring the top-level package is written as well. Returns
/// the marker paths written.
pub fn register_package(output_root: &Path, marker: &PackageMarker) -> Result<Vec<PathBuf>> {
    let package_root = output_root.join(PACKAGE_ROOT);
    if !package_root.is_dir() {
        return Err(Error::layout(format!(
            "package root {} does not exist",
            package_root.display()
        )));
    }

    let mut dirs = vec![package_root.clone()];
    let pattern = format!(
        "{}/**/*",
        Pattern::escape(&package_root.to_string_lossy())
    );
    for entry in glob(&pattern)? {
        let path = entry.map_err(|e| Error::layout(e.to_string()))?;
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut written = Vec::with_capacity(dirs.len() + 1);
    for dir in &dirs {
        written.push(marker.write(dir)?);
    }

    if *marker == PackageMarker::RustModule {
        let root_module = output_root.join(RUST_MODULE_FILE);
        let contents = format!("{}pub mod {};\n", RUST_MODULE_HEADER, PACKAGE_ROOT);
        fs::write(&root_module, contents).map_err(|e| {
            Error::layout(format!("failed to write {}: {}", root_module.display(), e))
        })?;
        written.push(root_module);
    }

    info!(
        "Registered package under {} ({} markers, marker: {})",
        output_root.display(),
        written.len(),
        marker
    );
    Ok(written)
}

fn rust_module_index(dir: &Path) -> Result<String> {
    let mut children = Vec::new();
    let mut sources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_dir() {
            children.push(name.to_string());
        } else if name.ends_with(".rs") && name != RUST_MODULE_FILE {
            sources.push(name.to_string());
        }
    }
    children.sort();
    sources.sort();

    let mut index = String::from(RUST_MODULE_HEADER);
    for child in &children {
        index.push_str(&format!("pub mod {};\n", child));
    }
    for source in &sources {
        index.push_str(&format!("include!(\"{}\");\n", source));
    }
    Ok(index)
}
