//! profiles-proto
//!
//! Generates OpenTelemetry profiles bindings:
//! - `generate`: clone the pinned opentelemetry-proto commit (or use a local
//!   checkout), compile the profiles schemas and register the package tree
//! - `resolve`: report which schema layout a checkout provides
//! - `show-config`: print the effective settings

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use profiles_codegen::compiler::protoc_path;
use profiles_codegen::{
    GitSource, LocalSource, Pipeline, ProstCompiler, ProtocCompiler, SchemaCompiler, SchemaSource,
    TonicCompiler,
};
use profiles_core::config::load_environment;
use profiles_core::schema::dependency_schemas;
use profiles_core::{CompilerKind, PackageMarker, SchemaResolver, Settings};

#[derive(Parser, Debug)]
#[command(name = "profiles-proto")]
#[command(about = "Generate OpenTelemetry profiles bindings from opentelemetry-proto")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML); defaults to ./profiles-proto.toml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for profiles-proto crates
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch schemas and generate bindings
    Generate(GenerateArgs),

    /// Show which layout each schema family resolves to
    Resolve {
        /// opentelemetry-proto checkout to inspect
        #[arg(long)]
        proto_dir: PathBuf,
    },

    /// Print the effective settings
    ShowConfig {
        /// JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct GenerateArgs {
    /// Output root for the package tree
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use an existing opentelemetry-proto checkout instead of cloning
    #[arg(long)]
    proto_dir: Option<PathBuf>,

    /// Repository to clone
    #[arg(long)]
    url: Option<String>,

    /// Commit to check out
    #[arg(long)]
    commit: Option<String>,

    /// Schema compiler
    #[arg(long, value_parser = ["tonic", "prost", "protoc"])]
    compiler: Option<String>,

    /// protoc binary (default: $PROTOC, then protoc on PATH)
    #[arg(long)]
    protoc: Option<PathBuf>,

    /// protoc output plugin, repeatable (e.g. --plugin python --plugin grpc_python)
    #[arg(long = "plugin")]
    plugins: Vec<String>,

    /// Package marker: `rust` or an empty marker file name such as __init__.py
    #[arg(long)]
    marker: Option<String>,

    /// Skip gRPC client stubs (tonic)
    #[arg(long)]
    no_client: bool,

    /// Skip gRPC server stubs (tonic)
    #[arg(long)]
    no_server: bool,

    /// Leave the clone directory on disk
    #[arg(long)]
    keep_workdir: bool,
}

impl GenerateArgs {
    fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(output) = &self.output {
            settings.output.root = output.clone();
        }
        if let Some(url) = &self.url {
            settings.repository.url = url.clone();
        }
        if let Some(commit) = &self.commit {
            settings.repository.commit = commit.clone();
        }
        if let Some(compiler) = &self.compiler {
            settings.compiler.kind = parse_compiler_kind(compiler)?;
        }
        if let Some(protoc) = &self.protoc {
            settings.compiler.protoc = Some(protoc.clone());
        }
        if !self.plugins.is_empty() {
            settings.compiler.plugins = self.plugins.clone();
        }
        if let Some(marker) = &self.marker {
            settings.output.marker = Some(marker.clone());
        }
        if self.no_client {
            settings.compiler.build_client = false;
        }
        if self.no_server {
            settings.compiler.build_server = false;
        }
        if self.keep_workdir {
            settings.keep_workdir = true;
        }
        settings.validate()?;
        Ok(())
    }
}

fn parse_compiler_kind(value: &str) -> Result<CompilerKind> {
    match value {
        "tonic" => Ok(CompilerKind::Tonic),
        "prost" => Ok(CompilerKind::Prost),
        "protoc" => Ok(CompilerKind::Protoc),
        other => bail!("unknown compiler '{}'", other),
    }
}

fn build_compiler(settings: &Settings) -> Box<dyn SchemaCompiler> {
    let compiler = &settings.compiler;
    match compiler.kind {
        CompilerKind::Tonic => Box::new(
            TonicCompiler::new(compiler.build_client, compiler.build_server)
                .with_protoc(compiler.protoc.clone()),
        ),
        CompilerKind::Prost => Box::new(ProstCompiler::new(compiler.protoc.clone())),
        CompilerKind::Protoc => Box::new(ProtocCompiler::new(
            protoc_path(compiler.protoc.as_deref()),
            compiler.plugins.clone(),
        )),
    }
}

fn build_source(settings: &Settings, proto_dir: Option<&PathBuf>) -> Box<dyn SchemaSource> {
    match proto_dir {
        Some(dir) => Box::new(LocalSource::new(dir)),
        None => Box::new(GitSource::new(
            settings.repository.url.clone(),
            settings.repository.commit.clone(),
        )),
    }
}

fn generate(mut settings: Settings, args: &GenerateArgs) -> Result<()> {
    args.apply(&mut settings)?;

    let source = build_source(&settings, args.proto_dir.as_ref());
    let compiler = build_compiler(&settings);
    let marker = match &settings.output.marker {
        Some(marker) => PackageMarker::from_setting(marker)?,
        None => compiler.default_marker(),
    };

    let manifest = Pipeline::new(source.as_ref(), compiler.as_ref(), &settings.output.root)
        .with_marker(marker)
        .keep_workdir(settings.keep_workdir)
        .run()
        .with_context(|| {
            format!(
                "failed to generate profiles bindings into {}",
                settings.output.root.display()
            )
        })?;

    for family in &manifest.families {
        info!(
            "{}: {} ({} file(s) copied)",
            family.family,
            family.selected,
            family.copied.len()
        );
    }
    println!(
        "Generated {} file(s) in {}",
        manifest.files.len(),
        settings.output.root.display()
    );
    Ok(())
}

fn resolve(proto_dir: &Path) -> Result<()> {
    if !proto_dir.is_dir() {
        bail!("{} is not a directory", proto_dir.display());
    }

    let resolver = SchemaResolver::new(proto_dir);
    let mut unresolved = 0;
    for result in resolver.resolve_all() {
        let status = match result.verify() {
            Ok(()) => "ok",
            Err(_) => {
                unresolved += 1;
                "missing"
            }
        };
        println!(
            "{:<20} {:<8} {:<8} copy: {:<3} {}",
            result.family.name,
            result.layout_name(),
            status,
            if result.used_legacy_layout { "yes" } else { "no" },
            result.relative_path().display()
        );
    }
    for dependency in dependency_schemas(proto_dir) {
        if !dependency.is_file() {
            unresolved += 1;
            println!("missing dependency   {}", dependency.display());
        }
    }

    if unresolved > 0 {
        bail!("{} schema(s) missing under {}", unresolved, proto_dir.display());
    }
    Ok(())
}

fn show_config(settings: &Settings, json: bool) -> Result<()> {
    let rendered = if json {
        serde_json::to_string_pretty(settings)?
    } else {
        toml::to_string_pretty(settings)?
    };
    println!("{}", rendered);
    Ok(())
}

fn init_tracing(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["profiles_proto", "profiles_codegen", "profiles_core"] {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> Result<()> {
    load_environment();

    let args = Args::parse();
    init_tracing(args.verbose, args.log_json)?;

    let settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;

    match &args.command {
        Commands::Generate(generate_args) => generate(settings, generate_args),
        Commands::Resolve { proto_dir } => resolve(proto_dir),
        Commands::ShowConfig { json } => show_config(&settings, *json),
    }
}
