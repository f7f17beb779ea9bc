//! Schema compilers
//!
//! Every compiler writes bindings under a directory tree that mirrors each
//! schema's protobuf package, e.g. `opentelemetry.proto.profiles.v1experimental`
//! ends up in `opentelemetry/proto/profiles/v1experimental/`. Layout
//! normalization relies on that.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use profiles_core::{Error, PackageMarker, Result};

use crate::source::render_command;

/// File descriptor set written next to the Rust bindings
pub const DESCRIPTOR_SET_FILE: &str = "profiles_descriptor.bin";

/// Generates bindings from `.proto` files
pub trait SchemaCompiler {
    fn name(&self) -> &'static str;

    /// Marker used when the settings don't name one
    fn default_marker(&self) -> PackageMarker;

    /// Compile `schemas` (resolved against `include_dirs`) into `output_dir`.
    fn generate(&self, include_dirs: &[PathBuf], output_dir: &Path, schemas: &[PathBuf]) -> Result<()>;
}

/// Resolve the `protoc` binary: explicit path, then `$PROTOC`, then `PATH`.
pub fn protoc_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PROTOC").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("protoc"))
}

/// In-process generation of Rust messages and gRPC stubs via tonic-build
#[derive(Debug, Clone)]
pub struct TonicCompiler {
    build_client: bool,
    build_server: bool,
    protoc: Option<PathBuf>,
}

impl Default for TonicCompiler {
    fn default() -> Self {
        Self {
            build_client: true,
            build_server: true,
            protoc: None,
        }
    }
}

impl TonicCompiler {
    pub fn new(build_client: bool, build_server: bool) -> Self {
        Self {
            build_client,
            build_server,
            protoc: None,
        }
    }

    pub fn with_protoc(mut self, protoc: Option<PathBuf>) -> Self {
        self.protoc = protoc;
        self
    }
}

impl SchemaCompiler for TonicCompiler {
    fn name(&self) -> &'static str {
        "tonic"
    }

    fn default_marker(&self) -> PackageMarker {
        PackageMarker::RustModule
    }

    fn generate(&self, include_dirs: &[PathBuf], output_dir: &Path, schemas: &[PathBuf]) -> Result<()> {
        // prost-build only reads the protoc location from the environment
        if let Some(protoc) = &self.protoc {
            std::env::set_var("PROTOC", protoc);
        }

        let staging = tempfile::Builder::new()
            .prefix("profiles-proto-tonic-")
            .tempdir()?;

        info!(
            "Compiling {} schema(s) with tonic-build (client: {}, server: {})",
            schemas.len(),
            self.build_client,
            self.build_server
        );
        tonic_build::configure()
            .build_client(self.build_client)
            .build_server(self.build_server)
            .emit_rerun_if_changed(false)
            .file_descriptor_set_path(staging.path().join(DESCRIPTOR_SET_FILE))
            .out_dir(staging.path())
            .compile(schemas, include_dirs)
            .map_err(|e| Error::compiler(format!("tonic-build failed: {}", e)))?;

        place_package_files(staging.path(), output_dir)?;
        place_descriptor_set(staging.path(), output_dir)?;
        Ok(())
    }
}

/// In-process generation of Rust messages only, via prost-build
#[derive(Debug, Clone, Default)]
pub struct ProstCompiler {
    protoc: Option<PathBuf>,
}

impl ProstCompiler {
    pub fn new(protoc: Option<PathBuf>) -> Self {
        Self { protoc }
    }
}

impl SchemaCompiler for ProstCompiler {
    fn name(&self) -> &'static str {
        "prost"
    }

    fn default_marker(&self) -> PackageMarker {
        PackageMarker::RustModule
    }

    fn generate(&self, include_dirs: &[PathBuf], output_dir: &Path, schemas: &[PathBuf]) -> Result<()> {
        if let Some(protoc) = &self.protoc {
            std::env::set_var("PROTOC", protoc);
        }

        let staging = tempfile::Builder::new()
            .prefix("profiles-proto-prost-")
            .tempdir()?;

        info!("Compiling {} schema(s) with prost-build", schemas.len());
        prost_build::Config::new()
            .out_dir(staging.path())
            .compile_protos(schemas, include_dirs)
            .map_err(|e| Error::compiler(format!("prost-build failed: {}", e)))?;

        place_package_files(staging.path(), output_dir)
    }
}

/// Move prost's flat `<package>.rs` files into their package directories.
fn place_package_files(staging: &Path, output_dir: &Path) -> Result<()> {
    for entry in fs::read_dir(staging)? {
        let generated = entry?.path();
        let Some(file_name) = generated.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(package_dir) = package_dir(file_name) else {
            debug!("Skipping {}", generated.display());
            continue;
        };
        let target_dir = output_dir.join(package_dir);
        fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(file_name);
        fs::copy(&generated, &target).map_err(|e| {
            Error::compiler(format!(
                "failed to place {} at {}: {}",
                file_name,
                target.display(),
                e
            ))
        })?;
        debug!("Generated {}", target.display());
    }
    Ok(())
}

/// Copy the file descriptor set from `staging` to the output root.
fn place_descriptor_set(staging: &Path, output_dir: &Path) -> Result<PathBuf> {
    let target = output_dir.join(DESCRIPTOR_SET_FILE);
    fs::copy(staging.join(DESCRIPTOR_SET_FILE), &target).map_err(|e| {
        Error::compiler(format!(
            "failed to place descriptor set at {}: {}",
            target.display(),
            e
        ))
    })?;
    Ok(target)
}

/// Directory for a prost output file named after its package
/// (`a.b.c.rs` -> `a/b/c`). Package-less output (`_.rs`) has none.
pub fn package_dir(file_name: &str) -> Option<PathBuf> {
    let package = file_name.strip_suffix(".rs")?;
    if package.is_empty() || package == "_" {
        return None;
    }
    Some(package.split('.').collect())
}

/// External `protoc` with one `--<plugin>_out` per configured plugin
#[derive(Debug, Clone)]
pub struct ProtocCompiler {
    protoc: PathBuf,
    plugins: Vec<String>,
}

impl ProtocCompiler {
    pub fn new(protoc: impl Into<PathBuf>, plugins: Vec<String>) -> Self {
        Self {
            protoc: protoc.into(),
            plugins,
        }
    }

    pub fn command(&self, include_dirs: &[PathBuf], output_dir: &Path, schemas: &[PathBuf]) -> Command {
        let mut cmd = Command::new(&self.protoc);
        for include in include_dirs {
            let mut arg = OsString::from("-I");
            arg.push(include);
            cmd.arg(arg);
        }
        for plugin in &self.plugins {
            let mut arg = OsString::from(format!("--{}_out=", plugin));
            arg.push(output_dir);
            cmd.arg(arg);
        }
        cmd.args(schemas);
        cmd
    }
}

impl SchemaCompiler for ProtocCompiler {
    fn name(&self) -> &'static str {
        "protoc"
    }

    fn default_marker(&self) -> PackageMarker {
        PackageMarker::Empty("__init__.py".to_string())
    }

    fn generate(&self, include_dirs: &[PathBuf], output_dir: &Path, schemas: &[PathBuf]) -> Result<()> {
        let mut cmd = self.command(include_dirs, output_dir, schemas);
        let rendered = render_command(&cmd);
        info!("Running {}", rendered);

        let output = cmd.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::compiler(format!(
                "protoc not found at '{}'; install it or set PROTOC",
                self.protoc.display()
            )),
            _ => Error::compiler(format!("failed to run {}: {}", rendered, e)),
        })?;

        if !output.status.success() {
            return Err(Error::compiler(format!(
                "protoc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
