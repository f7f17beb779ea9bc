//! End-to-end pipeline runs against local schema trees and a recording compiler

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use profiles_codegen::{
    Checkout, GenerationManifest, LocalSource, Pipeline, SchemaCompiler, SchemaSource, MANIFEST_FILE,
};
use profiles_core::schema::{CANONICAL_PACKAGES, DEPENDENCY_SCHEMAS};
use profiles_core::{Error, PackageMarker, Result, COLLECTOR_PROFILES, PROFILES};
use tempfile::TempDir;

/// Writes `<stem>_pb2.py` next to where each schema lives, like protoc's python plugin
#[derive(Default)]
struct RecordingCompiler {
    invocations: RefCell<Vec<Vec<PathBuf>>>,
    fail: bool,
}

impl SchemaCompiler for RecordingCompiler {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn default_marker(&self) -> PackageMarker {
        PackageMarker::Empty("__init__.py".to_string())
    }

    fn generate(&self, include_dirs: &[PathBuf], output_dir: &Path, schemas: &[PathBuf]) -> Result<()> {
        self.invocations.borrow_mut().push(schemas.to_vec());
        if self.fail {
            return Err(Error::compiler("protoc exited with exit status: 1: bad schema"));
        }
        for schema in schemas {
            let relative = schema.strip_prefix(&include_dirs[0]).unwrap();
            let stem = relative.file_stem().unwrap().to_str().unwrap();
            let dir = output_dir.join(relative.parent().unwrap());
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(format!("{}_pb2.py", stem)), format!("# from {}\n", relative.display()))?;
        }
        Ok(())
    }
}

/// Serves a fixed tree and remembers the work dir it was handed
struct TrackingSource {
    root: PathBuf,
    work_dir: RefCell<Option<PathBuf>>,
    fail: bool,
}

impl TrackingSource {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            work_dir: RefCell::new(None),
            fail: false,
        }
    }

    fn seen_work_dir(&self) -> PathBuf {
        self.work_dir.borrow().clone().expect("checkout was not called")
    }
}

impl SchemaSource for TrackingSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn checkout(&self, work_dir: Option<&Path>) -> Result<Checkout> {
        let work_dir = work_dir.expect("no work dir handed to a cloning source");
        *self.work_dir.borrow_mut() = Some(work_dir.to_path_buf());
        fs::write(work_dir.join("clone.log"), b"cloned")?;
        if self.fail {
            return Err(Error::fetch("git clone exited with exit status: 128"));
        }
        Ok(Checkout {
            root: self.root.clone(),
            origin: "fixture".to_string(),
            commit: Some("ae87ce7c56e5fd356b77097b1d9a655ff00aa24f".to_string()),
        })
    }
}

/// Writes one `<package>.rs` per schema into its package directory, like prost
struct PackageFileCompiler;

impl SchemaCompiler for PackageFileCompiler {
    fn name(&self) -> &'static str {
        "package-files"
    }

    fn default_marker(&self) -> PackageMarker {
        PackageMarker::RustModule
    }

    fn generate(&self, include_dirs: &[PathBuf], output_dir: &Path, schemas: &[PathBuf]) -> Result<()> {
        for schema in schemas {
            let package_dir = schema.strip_prefix(&include_dirs[0]).unwrap().parent().unwrap();
            let package = package_dir
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(".");
            let dir = output_dir.join(package_dir);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(format!("{}.rs", package)), format!("// {}\n", package))?;
        }
        Ok(())
    }
}

enum Layout {
    Current,
    Legacy,
    Missing,
}

fn schema_repo(layout: Layout) -> TempDir {
    let repo = TempDir::new().unwrap();
    let mut files: Vec<&str> = DEPENDENCY_SCHEMAS.to_vec();
    match layout {
        Layout::Current => {
            files.push(PROFILES.current_relative_path);
            files.push(COLLECTOR_PROFILES.current_relative_path);
        }
        Layout::Legacy => {
            files.push(PROFILES.legacy_relative_path);
            files.push(COLLECTOR_PROFILES.legacy_relative_path);
        }
        Layout::Missing => {}
    }
    for file in files {
        let path = repo.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"syntax = \"proto3\";\n").unwrap();
    }
    repo
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_current_layout_generates_without_copy() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    let manifest = Pipeline::new(&source, &compiler, out.path()).run().unwrap();

    let profiles_dir = out.path().join("opentelemetry/proto/profiles/v1development");
    assert_eq!(list_dir(&profiles_dir), vec!["__init__.py", "profiles_pb2.py"]);
    assert!(!out.path().join("opentelemetry/proto/profiles/v1experimental").exists());

    for family in ["profiles", "collector_profiles"] {
        let record = manifest.family(family).unwrap();
        assert!(!record.used_legacy_layout);
        assert!(record.copied.is_empty());
    }
    assert_eq!(
        manifest.family("profiles").unwrap().selected,
        PROFILES.current_relative_path
    );

    let invocations = compiler.invocations.borrow();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].len(), 4);
    assert_eq!(invocations[0][0], repo.path().join(PROFILES.current_relative_path));
}

#[test]
fn test_legacy_layout_copies_into_canonical_dirs() {
    let repo = schema_repo(Layout::Legacy);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    let manifest = Pipeline::new(&source, &compiler, out.path()).run().unwrap();

    let legacy_dir = out.path().join("opentelemetry/proto/profiles/v1experimental");
    let canonical_dir = out.path().join("opentelemetry/proto/profiles/v1development");
    assert!(legacy_dir.join("profiles_pb2.py").is_file());
    assert_eq!(
        fs::read_to_string(canonical_dir.join("profiles_pb2.py")).unwrap(),
        fs::read_to_string(legacy_dir.join("profiles_pb2.py")).unwrap()
    );
    assert!(out
        .path()
        .join("opentelemetry/proto/collector/profiles/v1development/profiles_service_pb2.py")
        .is_file());

    let record = manifest.family("collector_profiles").unwrap();
    assert!(record.used_legacy_layout);
    assert_eq!(
        record.copied,
        vec!["opentelemetry/proto/collector/profiles/v1development/profiles_service_pb2.py"]
    );
    assert!(manifest.contains_file("opentelemetry/proto/profiles/v1development/profiles_pb2.py"));
}

#[test]
fn test_missing_schemas_fail_before_generation() {
    let repo = schema_repo(Layout::Missing);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    let err = Pipeline::new(&source, &compiler, out.path()).run().unwrap_err();
    match err {
        Error::SchemaNotFound { family, legacy, .. } => {
            assert_eq!(family, "profiles");
            assert_eq!(legacy, repo.path().join(PROFILES.legacy_relative_path));
        }
        other => panic!("expected SchemaNotFound, got {:?}", other),
    }
    assert!(compiler.invocations.borrow().is_empty());
    assert!(!out.path().join(MANIFEST_FILE).exists());
}

#[test]
fn test_missing_dependency_schema() {
    let repo = schema_repo(Layout::Current);
    fs::remove_file(repo.path().join(DEPENDENCY_SCHEMAS[1])).unwrap();
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    let err = Pipeline::new(&source, &compiler, out.path()).run().unwrap_err();
    assert!(matches!(err, Error::MissingSchema(path) if path.ends_with("resource.proto")));
    assert!(compiler.invocations.borrow().is_empty());
}

#[test]
fn test_markers_and_manifest_written() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    let manifest = Pipeline::new(&source, &compiler, out.path()).run().unwrap();

    for package in CANONICAL_PACKAGES {
        assert!(
            out.path().join(package).join("__init__.py").is_file(),
            "no marker in {}",
            package
        );
    }
    assert!(out.path().join("opentelemetry/__init__.py").is_file());

    let on_disk = GenerationManifest::read(out.path()).unwrap();
    assert_eq!(on_disk, manifest);
    assert_eq!(on_disk.compiler, "recording");
    assert_eq!(on_disk.marker, "__init__.py");
    assert_eq!(
        on_disk.commit.as_deref(),
        Some("ae87ce7c56e5fd356b77097b1d9a655ff00aa24f")
    );
}

#[test]
fn test_rust_marker_override() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    Pipeline::new(&source, &compiler, out.path())
        .with_marker(PackageMarker::RustModule)
        .run()
        .unwrap();

    assert!(out.path().join("mod.rs").is_file());
    assert!(out.path().join("opentelemetry/proto/common/v1/mod.rs").is_file());
    assert!(!out.path().join("opentelemetry/proto/common/v1/__init__.py").exists());
}

#[test]
fn test_rerun_converges() {
    let repo = schema_repo(Layout::Legacy);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();
    let pipeline = Pipeline::new(&source, &compiler, out.path());

    let first = pipeline.run().unwrap();
    let second = pipeline.run().unwrap();
    assert_eq!(first.files, second.files);
    for (a, b) in first.families.iter().zip(&second.families) {
        assert_eq!(a.selected, b.selected);
        assert!(b.used_legacy_layout);
    }
}

#[test]
fn test_work_dir_removed_after_success() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    Pipeline::new(&source, &compiler, out.path()).run().unwrap();
    assert!(!source.seen_work_dir().exists());
}

#[test]
fn test_work_dir_removed_after_fetch_failure() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let mut source = TrackingSource::new(repo.path());
    source.fail = true;
    let compiler = RecordingCompiler::default();

    let err = Pipeline::new(&source, &compiler, out.path()).run().unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
    assert!(!source.seen_work_dir().exists());
    assert!(compiler.invocations.borrow().is_empty());
}

#[test]
fn test_compiler_failure_is_fatal() {
    let repo = schema_repo(Layout::Legacy);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler {
        fail: true,
        ..Default::default()
    };

    let err = Pipeline::new(&source, &compiler, out.path()).run().unwrap_err();
    assert!(matches!(err, Error::Compiler(_)));
    assert!(!source.seen_work_dir().exists());
    assert!(!out.path().join(MANIFEST_FILE).exists());
    assert!(!out
        .path()
        .join("opentelemetry/proto/profiles/v1development/profiles_pb2.py")
        .exists());
}

#[test]
fn test_kept_work_dir_survives() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    Pipeline::new(&source, &compiler, out.path())
        .keep_workdir(true)
        .run()
        .unwrap();

    let kept = source.seen_work_dir();
    assert!(kept.join("clone.log").is_file());
    fs::remove_dir_all(kept).unwrap();
}

#[test]
fn test_failed_rerun_leaves_no_manifest() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let source = TrackingSource::new(repo.path());

    let compiler = RecordingCompiler::default();
    Pipeline::new(&source, &compiler, out.path()).run().unwrap();
    assert!(out.path().join(MANIFEST_FILE).is_file());

    let failing = RecordingCompiler {
        fail: true,
        ..Default::default()
    };
    let err = Pipeline::new(&source, &failing, out.path()).run().unwrap_err();
    assert!(matches!(err, Error::Compiler(_)));
    assert!(!out.path().join(MANIFEST_FILE).exists());
}

#[test]
fn test_failed_fetch_drops_previous_manifest() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let compiler = RecordingCompiler::default();
    let mut source = TrackingSource::new(repo.path());
    Pipeline::new(&source, &compiler, out.path()).run().unwrap();

    source.fail = true;
    assert!(Pipeline::new(&source, &compiler, out.path()).run().is_err());
    assert!(!out.path().join(MANIFEST_FILE).exists());
}

#[test]
fn test_layout_change_replaces_previous_output() {
    let legacy_repo = schema_repo(Layout::Legacy);
    let current_repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let compiler = PackageFileCompiler;

    let legacy = TrackingSource::new(legacy_repo.path());
    Pipeline::new(&legacy, &compiler, out.path()).run().unwrap();
    let canonical_dir = out.path().join("opentelemetry/proto/profiles/v1development");
    assert!(canonical_dir
        .join("opentelemetry.proto.profiles.v1experimental.rs")
        .is_file());

    let current = TrackingSource::new(current_repo.path());
    let manifest = Pipeline::new(&current, &compiler, out.path()).run().unwrap();

    let index = fs::read_to_string(canonical_dir.join("mod.rs")).unwrap();
    let includes: Vec<&str> = index.lines().filter(|line| line.starts_with("include!")).collect();
    assert_eq!(
        includes,
        vec!["include!(\"opentelemetry.proto.profiles.v1development.rs\");"]
    );
    assert!(!out.path().join("opentelemetry/proto/profiles/v1experimental").exists());
    assert!(!manifest
        .files
        .iter()
        .any(|file| file.path.contains("v1experimental")));
}

#[test]
fn test_local_source_runs_without_work_dir() {
    let repo = schema_repo(Layout::Current);
    let out = TempDir::new().unwrap();
    let source = LocalSource::new(repo.path());
    let compiler = RecordingCompiler::default();

    let manifest = Pipeline::new(&source, &compiler, out.path()).run().unwrap();
    assert_eq!(manifest.source, repo.path().display().to_string());
    assert!(manifest.commit.is_none());
    assert!(manifest.contains_file("opentelemetry/proto/profiles/v1development/profiles_pb2.py"));
}
