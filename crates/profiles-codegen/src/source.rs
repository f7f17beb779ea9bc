//! Schema sources
//!
//! A source yields a directory laid out like the upstream
//! `opentelemetry-proto` repository.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use profiles_core::{Error, Result};

/// Directory name of the clone inside the work dir
pub const CHECKOUT_DIR: &str = "opentelemetry-proto";

/// A schema tree ready to be resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    pub root: PathBuf,
    /// Where the schemas came from (URL or local path)
    pub origin: String,
    /// Commit checked out, when known
    pub commit: Option<String>,
}

/// Provides a schema repository root on disk
pub trait SchemaSource {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Whether [`checkout`](Self::checkout) needs scratch space
    fn needs_work_dir(&self) -> bool {
        true
    }

    /// Materialize the schema tree. `work_dir` is scratch space owned by the
    /// caller and removed after the run; it is `None` for sources that
    /// don't need one.
    fn checkout(&self, work_dir: Option<&Path>) -> Result<Checkout>;
}

/// Clones a repository and checks out a pinned commit
#[derive(Debug, Clone)]
pub struct GitSource {
    url: String,
    commit: String,
    git: PathBuf,
}

impl GitSource {
    pub fn new(url: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            commit: commit.into(),
            git: PathBuf::from("git"),
        }
    }

    /// Use a specific git binary instead of `git` on `PATH`
    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    fn run_git<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.git);
        cmd.args(args);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        let rendered = render_command(&cmd);
        debug!("Running {}", rendered);

        let output = cmd
            .output()
            .map_err(|e| Error::fetch(format!("failed to run {}: {}", rendered, e)))?;

        if !output.status.success() {
            return Err(Error::fetch(format!(
                "{} exited with {}: {}",
                rendered,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl SchemaSource for GitSource {
    fn describe(&self) -> String {
        format!("{}@{}", self.url, self.commit)
    }

    fn checkout(&self, work_dir: Option<&Path>) -> Result<Checkout> {
        let work_dir = work_dir
            .ok_or_else(|| Error::fetch(format!("cloning {} requires a work dir", self.url)))?;
        let root = work_dir.join(CHECKOUT_DIR);
        info!("Cloning {} into {}", self.url, root.display());
        self.run_git(
            [OsStr::new("clone"), OsStr::new(&self.url), root.as_os_str()],
            None,
        )?;

        info!("Checking out {}", self.commit);
        self.run_git(["checkout", self.commit.as_str()], Some(&root))?;

        let head = self.run_git(["rev-parse", "HEAD"], Some(&root))?;
        debug!("HEAD is {}", head);

        Ok(Checkout {
            root,
            origin: self.url.clone(),
            commit: Some(head),
        })
    }
}

/// Uses an existing checkout in place
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SchemaSource for LocalSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn needs_work_dir(&self) -> bool {
        false
    }

    fn checkout(&self, _work_dir: Option<&Path>) -> Result<Checkout> {
        if !self.root.is_dir() {
            return Err(Error::fetch(format!(
                "schema directory {} does not exist",
                self.root.display()
            )));
        }
        info!("Using local schemas at {}", self.root.display());
        Ok(Checkout {
            root: self.root.clone(),
            origin: self.root.display().to_string(),
            commit: None,
        })
    }
}

/// Render a command line for logs and error messages
pub(crate) fn render_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
