// Transform Options
//
// Global options shared by every transformation in a build. Serializable so
// option invalidations can hash the value a plugin observed.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    pub project_root: PathBuf,
    /// Globally enables or disables reading and writing the pipeline cache.
    #[serde(default = "default_true")]
    pub should_use_cache: bool,
    /// User-level environment variables exposed to plugins.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl TransformOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        TransformOptions {
            project_root: project_root.into(),
            should_use_cache: true,
            env: BTreeMap::new(),
            log_level: LogLevel::Info,
        }
    }
}
