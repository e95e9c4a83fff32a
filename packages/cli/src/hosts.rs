// CLI Hosts
//
// Concrete host implementations for running transformations from the
// command line: a directory-backed cache, a node_modules-style package
// manager, a relative-path resolver, and a console reporter.

use quarry_core::cache::Cache;
use quarry_core::diagnostics::{Diagnostic, DiagnosticError};
use quarry_core::package_manager::{PackageInvalidations, PackageManager};
use quarry_core::reporter::{Reporter, ReporterEvent};
use quarry_core::resolver::{PipelineResolver, ResolverResult};
use std::path::{Path, PathBuf};

/// Cache persisted as one file per key under a directory.
pub struct DirCache {
    root: PathBuf,
}

impl DirCache {
    pub fn new(root: PathBuf) -> Self {
        DirCache { root }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(quarry_core::hashing::hash_string(key))
    }
}

impl Cache for DirCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        if std::fs::create_dir_all(&self.root).is_ok() {
            let _ = std::fs::write(self.path_for(key), value);
        }
    }

    fn get_blob(&self, key: &str) -> Option<Vec<u8>> {
        self.get(key)
    }

    fn set_blob(&self, key: &str, value: Vec<u8>) {
        self.set(key, value);
    }
}

/// Resolves specifiers against node_modules under the project root.
pub struct LocalPackageManager {
    project_root: PathBuf,
}

impl LocalPackageManager {
    pub fn new(project_root: PathBuf) -> Self {
        LocalPackageManager { project_root }
    }
}

impl PackageManager for LocalPackageManager {
    fn resolve(&self, specifier: &str, _from: &Path) -> Result<PathBuf, DiagnosticError> {
        Ok(self.project_root.join("node_modules").join(specifier))
    }

    fn invalidate(&self, _specifier: &str, _from: &Path) {}

    fn get_invalidations(&self, specifier: &str, _from: &Path) -> PackageInvalidations {
        let mut invalidations = PackageInvalidations::default();
        let package_json = self
            .project_root
            .join("node_modules")
            .join(specifier)
            .join("package.json");
        if package_json.exists() {
            invalidations.invalidate_on_file_change.insert(package_json);
        }
        invalidations
    }
}

/// Resolves `./`-style specifiers relative to the importing file.
pub struct RelativeResolver;

impl PipelineResolver for RelativeResolver {
    fn resolve(&self, specifier: &str, from: &Path) -> Result<ResolverResult, DiagnosticError> {
        let base = from.parent().unwrap_or(from);
        let file_path = base.join(specifier);
        if !file_path.exists() {
            return Err(DiagnosticError::from(Diagnostic::new(
                "quarry",
                format!("Cannot resolve '{}' from {}", specifier, from.display()),
            )));
        }
        Ok(ResolverResult {
            invalidate_on_file_change: vec![file_path.clone()],
            file_path,
            invalidate_on_file_create: Vec::new(),
        })
    }
}

/// Prints progress events to stderr.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, event: &ReporterEvent) {
        match event {
            ReporterEvent::BuildProgress { file_path, .. } => {
                eprintln!("Transforming {}...", file_path.display());
            }
        }
    }
}
