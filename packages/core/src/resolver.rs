// Resolver Boundary
//
// The module resolver a pipeline delegates to when a transformer asks to
// resolve a specifier. Results carry the invalidations the resolution
// depended on; the transformation folds them into its trackers.

use crate::diagnostics::DiagnosticError;
use crate::invalidations::FileCreateInvalidation;
use std::path::{Path, PathBuf};

/// Outcome of resolving one specifier on behalf of a transformer.
#[derive(Debug, Clone, Default)]
pub struct ResolverResult {
    /// Absolute path of the resolved module.
    pub file_path: PathBuf,
    /// Absolute paths read while resolving.
    pub invalidate_on_file_change: Vec<PathBuf>,
    pub invalidate_on_file_create: Vec<FileCreateInvalidation>,
}

pub trait PipelineResolver: Send + Sync {
    fn resolve(&self, specifier: &str, from: &Path) -> Result<ResolverResult, DiagnosticError>;
}
