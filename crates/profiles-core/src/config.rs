//! Settings
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults (`Settings::default()`)
//! 2. An environment file loaded into the process environment (see [`load_environment`])
//! 3. A TOML file (`profiles-proto.toml`, or an explicit path)
//! 4. `PROFILES_PROTO__*` environment variables, e.g. `PROFILES_PROTO__REPOSITORY__COMMIT`
//!
//! Command-line flags are applied on top by the binary.

use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::markers::PackageMarker;
use crate::schema::{DEFAULT_COMMIT, DEFAULT_REPOSITORY_URL};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "profiles-proto.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "PROFILES_PROTO";

/// Commit override; kept verbatim since an all-digit short hash would
/// otherwise be parsed as a number
const COMMIT_ENV: &str = "PROFILES_PROTO__REPOSITORY__COMMIT";

/// Environment files to check, in order of priority
pub const ENV_FILE_PATHS: &[&str] = &["/etc/profiles-proto/environment", ".env"];

/// Which schema compiler generates the bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    /// In-process tonic-build (Rust messages plus gRPC stubs)
    #[default]
    Tonic,
    /// In-process prost-build (Rust messages only)
    Prost,
    /// External `protoc` with one or more output plugins
    Protoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySettings {
    pub url: String,
    pub commit: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REPOSITORY_URL.to_string(),
            commit: DEFAULT_COMMIT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub root: PathBuf,
    /// `rust`, an empty-marker file name, or unset for the compiler's default
    pub marker: Option<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("generated"),
            marker: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub kind: CompilerKind,
    /// Explicit `protoc` binary; falls back to `$PROTOC`, then `protoc` on `PATH`
    pub protoc: Option<PathBuf>,
    /// `protoc` output plugins, each passed as `--<plugin>_out`
    pub plugins: Vec<String>,
    pub build_client: bool,
    pub build_server: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            kind: CompilerKind::default(),
            protoc: None,
            plugins: vec!["python".to_string(), "grpc_python".to_string()],
            build_client: true,
            build_server: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Leave the clone directory on disk after the run
    pub keep_workdir: bool,
    pub repository: RepositorySettings,
    pub output: OutputSettings,
    pub compiler: CompilerSettings,
}

impl Settings {
    /// Load settings from defaults, an optional TOML file and the environment.
    ///
    /// An explicit `path` must exist; without one, `profiles-proto.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Like [`Settings::load`], reading overrides from `env` instead of the
    /// process environment when given.
    fn load_from(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let commit_override = match &env {
            Some(env) => env.get(COMMIT_ENV).cloned(),
            None => std::env::var(COMMIT_ENV).ok(),
        };

        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("compiler.plugins")
                    .source(env),
            )
            .set_override_option("repository.commit", commit_override)?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Reject settings a run could not succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.repository.url.trim().is_empty() {
            return Err(Error::config("repository.url must not be empty"));
        }
        if !is_commit_hash(&self.repository.commit) {
            return Err(Error::config(format!(
                "repository.commit '{}' is not a 7-40 digit hex commit hash",
                self.repository.commit
            )));
        }
        if self.compiler.kind == CompilerKind::Protoc && self.compiler.plugins.is_empty() {
            return Err(Error::config(
                "compiler.plugins must name at least one protoc output plugin",
            ));
        }
        if let Some(marker) = &self.output.marker {
            PackageMarker::from_setting(marker)?;
        }
        Ok(())
    }
}

fn is_commit_hash(commit: &str) -> bool {
    (7..=40).contains(&commit.len()) && commit.chars().all(|c| c.is_ascii_hexdigit())
}

/// Load `KEY=VALUE` lines from the first environment file found.
///
/// `PROFILES_PROTO_ENV_FILE` is checked first, then [`ENV_FILE_PATHS`].
/// Variables already set in the process environment are never overridden.
/// Returns the path that was loaded, if any.
pub fn load_environment() -> Option<PathBuf> {
    if let Ok(custom_path) = std::env::var("PROFILES_PROTO_ENV_FILE") {
        if let Some(path) = try_load_env_file(Path::new(&custom_path)) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded) = try_load_env_file(Path::new(path)) {
            return Some(loaded);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

fn try_load_env_file(path: &Path) -> Option<PathBuf> {
    if !path.is_file() {
        return None;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path.display(), e);
            return None;
        }
    };

    let mut loaded = 0;
    for (key, value) in parse_env_file(&content) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, &value);
            loaded += 1;
        } else {
            debug!("Skipped (already set): {}", key);
        }
    }

    info!(
        "Loaded {} environment variables from {}",
        loaded,
        path.display()
    );
    Some(path.to_path_buf())
}

/// Parse environment file contents, skipping blanks and `#` comments.
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_env_line)
        .collect()
}

fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}
