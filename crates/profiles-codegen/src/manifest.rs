//! Generation manifest
//!
//! Written last into the output root; its presence marks a complete run.

use chrono::{DateTime, Utc};
use glob::{glob, Pattern};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use profiles_core::schema::PACKAGE_ROOT;
use profiles_core::{Error, ResolutionResult, Result};

pub const MANIFEST_FILE: &str = "profiles-proto.manifest.json";

/// Record of one successful generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub generator: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub commit: Option<String>,
    pub compiler: String,
    pub marker: String,
    pub families: Vec<FamilyRecord>,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub family: String,
    /// Selected schema, relative to the repository root
    pub selected: String,
    pub used_legacy_layout: bool,
    /// Files copied into the canonical directory, relative to the output root
    pub copied: Vec<String>,
}

impl FamilyRecord {
    pub fn new(result: &ResolutionResult, copied: &[PathBuf], output_root: &Path) -> Self {
        Self {
            family: result.family.name.to_string(),
            selected: slash_path(result.relative_path()),
            used_legacy_layout: result.used_legacy_layout,
            copied: copied
                .iter()
                .map(|path| slash_path(path.strip_prefix(output_root).unwrap_or(path)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Relative to the output root, `/`-separated
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

impl GenerationManifest {
    /// Every file of the package tree under `output_root`, sorted by path
    pub fn collect_files(output_root: &Path) -> Result<Vec<FileRecord>> {
        let pattern = format!(
            "{}/**/*",
            Pattern::escape(&output_root.join(PACKAGE_ROOT).to_string_lossy())
        );

        let mut files = Vec::new();
        for entry in glob(&pattern)? {
            let path = entry.map_err(|e| Error::layout(e.to_string()))?;
            if !path.is_file() {
                continue;
            }
            let contents = fs::read(&path)?;
            let relative = path.strip_prefix(output_root).unwrap_or(&path);
            files.push(FileRecord {
                path: slash_path(relative),
                size: contents.len() as u64,
                sha256: format!("{:x}", Sha256::digest(&contents)),
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    pub fn path(output_root: &Path) -> PathBuf {
        output_root.join(MANIFEST_FILE)
    }

    pub fn write(&self, output_root: &Path) -> Result<PathBuf> {
        let path = Self::path(output_root);
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }

    /// Delete the manifest of a previous run. Returns whether one existed.
    pub fn remove(output_root: &Path) -> Result<bool> {
        match fs::remove_file(Self::path(output_root)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn read(output_root: &Path) -> Result<Self> {
        let contents = fs::read(Self::path(output_root))?;
        Ok(serde_json::from_slice(&contents)?)
    }

    pub fn family(&self, name: &str) -> Option<&FamilyRecord> {
        self.families.iter().find(|record| record.family == name)
    }

    pub fn contains_file(&self, relative: &str) -> bool {
        self.files.iter().any(|file| file.path == relative)
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
