//! Generation pipeline
//!
//! One strictly sequential run:
//!
//! 1. drop the previous run's manifest
//! 2. acquire a scoped work dir, when the source needs one, and check out the
//!    schema tree
//! 3. resolve and verify every schema family, check dependency schemas
//! 4. replace the previous package tree with a fresh canonical one
//! 5. run the compiler once over all schemas
//! 6. copy legacy-layout output into the canonical directories
//! 7. write package markers and the manifest
//!
//! Any failure aborts the run; the work dir is removed on every exit path.
//! The manifest only exists after a run that completed.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use profiles_core::markers::{clear_package_tree, prepare_package_tree, register_package};
use profiles_core::schema::dependency_schemas;
use profiles_core::{normalize_output_layout, Error, PackageMarker, Result, SchemaResolver};

use crate::compiler::{SchemaCompiler, DESCRIPTOR_SET_FILE};
use crate::manifest::{FamilyRecord, GenerationManifest};
use crate::source::SchemaSource;
use crate::workdir::WorkDir;

pub struct Pipeline<'a> {
    source: &'a dyn SchemaSource,
    compiler: &'a dyn SchemaCompiler,
    output_root: PathBuf,
    marker: PackageMarker,
    keep_workdir: bool,
}

impl<'a> Pipeline<'a> {
    /// Uses the compiler's default package marker.
    pub fn new(
        source: &'a dyn SchemaSource,
        compiler: &'a dyn SchemaCompiler,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            compiler,
            output_root: output_root.into(),
            marker: compiler.default_marker(),
            keep_workdir: false,
        }
    }

    pub fn with_marker(mut self, marker: PackageMarker) -> Self {
        self.marker = marker;
        self
    }

    pub fn keep_workdir(mut self, keep: bool) -> Self {
        self.keep_workdir = keep;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Run the whole pipeline and return the manifest it wrote.
    pub fn run(&self) -> Result<GenerationManifest> {
        info!(
            "Generating profiles bindings from {} with {} into {}",
            self.source.describe(),
            self.compiler.name(),
            self.output_root.display()
        );

        let result = self.run_with_work_dir();
        if let Err(e) = &result {
            error!(
                "Profiles binding generation from {} failed: {}",
                self.source.describe(),
                e
            );
        }
        result
    }

    fn run_with_work_dir(&self) -> Result<GenerationManifest> {
        if GenerationManifest::remove(&self.output_root)? {
            debug!("Removed manifest of the previous run");
        }

        let work_dir = if self.source.needs_work_dir() {
            Some(WorkDir::new(self.keep_workdir)?)
        } else {
            None
        };
        self.run_in(work_dir.as_ref().map(WorkDir::path))
    }

    fn run_in(&self, work_dir: Option<&Path>) -> Result<GenerationManifest> {
        let checkout = self.source.checkout(work_dir)?;

        let resolutions = SchemaResolver::new(&checkout.root).resolve_all();
        for resolution in &resolutions {
            resolution.verify()?;
            info!(
                "{}: {} layout, {}",
                resolution.family.name,
                resolution.layout_name(),
                resolution.relative_path().display()
            );
        }

        let dependencies = dependency_schemas(&checkout.root);
        if let Some(missing) = dependencies.iter().find(|path| !path.is_file()) {
            return Err(Error::MissingSchema(missing.clone()));
        }

        fs::create_dir_all(&self.output_root).map_err(|e| {
            Error::layout(format!(
                "failed to create output root {}: {}",
                self.output_root.display(),
                e
            ))
        })?;
        self.clear_previous_output()?;
        prepare_package_tree(&self.output_root)?;

        let schemas: Vec<PathBuf> = resolutions
            .iter()
            .map(|resolution| resolution.selected_path.clone())
            .chain(dependencies)
            .collect();
        self.compiler
            .generate(&[checkout.root.clone()], &self.output_root, &schemas)?;

        let mut families = Vec::with_capacity(resolutions.len());
        for resolution in &resolutions {
            let copied =
                normalize_output_layout(&resolution.family, resolution, &self.output_root)?;
            if resolution.used_legacy_layout && copied.is_empty() {
                warn!(
                    "{}: legacy layout selected but {} produced no output under {}",
                    resolution.family.name,
                    self.compiler.name(),
                    resolution.family.legacy_output_dir().display()
                );
            }
            families.push(FamilyRecord::new(resolution, &copied, &self.output_root));
        }

        register_package(&self.output_root, &self.marker)?;

        let manifest = GenerationManifest {
            generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            generated_at: Utc::now(),
            source: checkout.origin,
            commit: checkout.commit,
            compiler: self.compiler.name().to_string(),
            marker: self.marker.to_string(),
            families,
            files: GenerationManifest::collect_files(&self.output_root)?,
        };
        let manifest_path = manifest.write(&self.output_root)?;

        info!(
            "Generated {} file(s); manifest at {}",
            manifest.files.len(),
            manifest_path.display()
        );
        Ok(manifest)
    }

    fn clear_previous_output(&self) -> Result<()> {
        if clear_package_tree(&self.output_root)? {
            info!(
                "Replacing previous package tree under {}",
                self.output_root.display()
            );
        }
        let descriptor = self.output_root.join(DESCRIPTOR_SET_FILE);
        if descriptor.is_file() {
            fs::remove_file(&descriptor)?;
        }
        Ok(())
    }
}
