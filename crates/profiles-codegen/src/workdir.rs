//! Scoped working directory for one generation run

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use profiles_core::{Error, Result};

/// Temporary directory removed when dropped, on success, error and unwind alike.
///
/// With `keep` set the directory is left on disk instead and its location logged.
#[derive(Debug)]
pub struct WorkDir {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    pub fn new(keep: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("profiles-proto-")
            .tempdir()
            .map_err(|e| Error::layout(format!("failed to create work dir: {}", e)))?;
        let path = dir.path().to_path_buf();
        debug!("Created work dir {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.keep {
            let kept = dir.into_path();
            warn!("Keeping work dir {}", kept.display());
            return;
        }
        if let Err(e) = dir.close() {
            warn!("Failed to remove work dir {}: {}", self.path.display(), e);
        } else {
            debug!("Removed work dir {}", self.path.display());
        }
    }
}
