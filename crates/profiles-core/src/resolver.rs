//! Schema layout resolution
//!
//! Picks, per [`SchemaFamily`], whichever of the current or legacy schema
//! paths a checkout provides, and after generation copies bindings produced
//! under the legacy directory name into the canonical one.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema::{SchemaFamily, SCHEMA_FAMILIES};

/// Outcome of resolving one family against a repository root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub family: SchemaFamily,
    pub selected_path: PathBuf,
    pub used_legacy_layout: bool,
    repo_root: PathBuf,
}

impl ResolutionResult {
    /// Fail unless the selected schema exists.
    ///
    /// [`resolve`] falls back to the legacy candidate without looking at it;
    /// this turns a checkout that has neither layout into a precise error.
    pub fn verify(&self) -> Result<()> {
        if self.selected_path.is_file() {
            return Ok(());
        }
        Err(Error::SchemaNotFound {
            family: self.family.name.to_string(),
            current: self.family.current_candidate(&self.repo_root),
            legacy: self.family.legacy_candidate(&self.repo_root),
        })
    }

    /// Selected schema relative to the repository root
    pub fn relative_path(&self) -> &Path {
        self.selected_path
            .strip_prefix(&self.repo_root)
            .unwrap_or(&self.selected_path)
    }

    pub fn layout_name(&self) -> &'static str {
        if self.used_legacy_layout {
            "legacy"
        } else {
            "current"
        }
    }
}

/// Resolve `family` against `repo_root`.
///
/// Returns the current-layout candidate when it exists, otherwise the legacy
/// candidate. The legacy candidate is not checked; see [`ResolutionResult::verify`].
pub fn resolve(family: &SchemaFamily, repo_root: &Path) -> ResolutionResult {
    let current = family.current_candidate(repo_root);
    if current.exists() {
        debug!("{}: using current layout at {}", family.name, current.display());
        return ResolutionResult {
            family: *family,
            selected_path: current,
            used_legacy_layout: false,
            repo_root: repo_root.to_path_buf(),
        };
    }

    let legacy = family.legacy_candidate(repo_root);
    debug!(
        "{}: current layout absent, falling back to {}",
        family.name,
        legacy.display()
    );
    ResolutionResult {
        family: *family,
        selected_path: legacy,
        used_legacy_layout: true,
        repo_root: repo_root.to_path_buf(),
    }
}

/// Copy bindings generated under the legacy directory into the canonical one.
///
/// Does nothing unless `result` used the legacy layout, or when the generator
/// produced no legacy output directory. Originals stay in place and existing
/// destination files are overwritten, so repeated runs converge on the same
/// file set. Returns the destination paths written.
pub fn normalize_output_layout(
    family: &SchemaFamily,
    result: &ResolutionResult,
    generated_output_root: &Path,
) -> Result<Vec<PathBuf>> {
    if !result.used_legacy_layout {
        return Ok(Vec::new());
    }

    let legacy_dir = generated_output_root.join(family.legacy_output_dir());
    if !legacy_dir.is_dir() {
        debug!(
            "{}: no legacy output at {}, nothing to copy",
            family.name,
            legacy_dir.display()
        );
        return Ok(Vec::new());
    }

    let canonical_dir = generated_output_root.join(family.canonical_output_dir());
    fs::create_dir_all(&canonical_dir).map_err(|e| {
        Error::layout(format!(
            "failed to create {}: {}",
            canonical_dir.display(),
            e
        ))
    })?;

    let mut entries: Vec<PathBuf> = fs::read_dir(&legacy_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut copied = Vec::with_capacity(entries.len());
    for source in entries {
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let destination = canonical_dir.join(file_name);
        fs::copy(&source, &destination).map_err(|e| {
            Error::layout(format!(
                "failed to copy {} to {}: {}",
                source.display(),
                destination.display(),
                e
            ))
        })?;
        copied.push(destination);
    }

    info!(
        "{}: copied {} generated file(s) from {} to {}",
        family.name,
        copied.len(),
        family.legacy_output_dir().display(),
        family.canonical_output_dir().display()
    );
    Ok(copied)
}

/// Resolves every known family against one repository checkout
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    repo_root: PathBuf,
}

impl SchemaResolver {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn resolve(&self, family: &SchemaFamily) -> ResolutionResult {
        resolve(family, &self.repo_root)
    }

    /// Resolve all families in [`SCHEMA_FAMILIES`] order
    pub fn resolve_all(&self) -> Vec<ResolutionResult> {
        SCHEMA_FAMILIES
            .iter()
            .map(|family| self.resolve(family))
            .collect()
    }
}
