// Plugin Config
//
// Per-plugin persistent state produced by a transformer's `load_config`
// hook, and the serializable invalidation record derived from it.

use crate::dev_deps::DevDepSpecifier;
use crate::environment::Environment;
use crate::hashing::hash_string;
use crate::invalidations::FileCreateInvalidation;
use crate::paths::ProjectPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Failure to turn a config result into its canonical hashable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigHashError {
    pub message: String,
}

impl ConfigHashError {
    pub fn new(message: impl Into<String>) -> Self {
        ConfigHashError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigHashError {}

/// Opaque state a plugin stores on its config. The pipeline hash folds in
/// the canonical form, so it must be deterministic; implementations that
/// cannot produce one return an error and the plugin must set an explicit
/// result hash instead.
pub trait ConfigResult: fmt::Debug + Send + Sync {
    fn canonical(&self) -> Result<String, ConfigHashError>;
}

/// Any JSON value canonicalizes through sorted-key serialization.
#[derive(Debug, Clone)]
pub struct JsonConfigResult(pub serde_json::Value);

impl ConfigResult for JsonConfigResult {
    fn canonical(&self) -> Result<String, ConfigHashError> {
        Ok(crate::hashing::canonical_json(&self.0))
    }
}

/// Per-plugin config state for one search path.
#[derive(Debug)]
pub struct PluginConfig {
    pub id: String,
    pub plugin_name: String,
    /// Project-relative path config discovery starts from (the asset path).
    pub search_path: ProjectPath,
    pub env: Environment,
    pub is_source: bool,
    pub result: Option<Box<dyn ConfigResult>>,
    pub result_hash: Option<String>,
    pub included_files: BTreeSet<ProjectPath>,
    pub invalidate_on_file_create: Vec<FileCreateInvalidation>,
    pub invalidate_on_option_change: BTreeSet<String>,
    pub should_invalidate_on_startup: bool,
    pub dev_deps: Vec<DevDepSpecifier>,
}

impl PluginConfig {
    pub fn new(
        plugin_name: impl Into<String>,
        search_path: ProjectPath,
        is_source: bool,
        env: Environment,
    ) -> Self {
        let plugin_name = plugin_name.into();
        let id = hash_string(&format!("{}:{}:{}", plugin_name, search_path, is_source));
        PluginConfig {
            id,
            plugin_name,
            search_path,
            env,
            is_source,
            result: None,
            result_hash: None,
            included_files: BTreeSet::new(),
            invalidate_on_file_create: Vec::new(),
            invalidate_on_option_change: BTreeSet::new(),
            should_invalidate_on_startup: false,
            dev_deps: Vec::new(),
        }
    }

    pub fn set_result(&mut self, result: impl ConfigResult + 'static) {
        self.result = Some(Box::new(result));
    }

    pub fn set_result_hash(&mut self, hash: impl Into<String>) {
        self.result_hash = Some(hash.into());
    }

    /// Record a file the config depends on.
    pub fn add_included_file(&mut self, path: ProjectPath) {
        self.included_files.insert(path);
    }

    pub fn add_file_create_invalidation(&mut self, invalidation: FileCreateInvalidation) {
        if !self.invalidate_on_file_create.contains(&invalidation) {
            self.invalidate_on_file_create.push(invalidation);
        }
    }

    /// Record a global option whose change must re-run the plugin.
    pub fn add_option_invalidation(&mut self, key: impl Into<String>) {
        self.invalidate_on_option_change.insert(key.into());
    }

    pub fn invalidate_on_startup(&mut self) {
        self.should_invalidate_on_startup = true;
    }

    /// Declare a build-time package dependency of the plugin.
    pub fn add_dev_dependency(&mut self, dep: DevDepSpecifier) {
        if !self.dev_deps.contains(&dep) {
            self.dev_deps.push(dep);
        }
    }

    /// A config with nothing to invalidate on produces no request.
    pub fn is_empty(&self) -> bool {
        self.included_files.is_empty()
            && self.invalidate_on_file_create.is_empty()
            && !self.should_invalidate_on_startup
    }

    pub fn to_request(&self) -> ConfigRequest {
        ConfigRequest {
            id: self.id.clone(),
            plugin_name: self.plugin_name.clone(),
            search_path: self.search_path.clone(),
            is_source: self.is_source,
            included_files: self.included_files.iter().cloned().collect(),
            invalidate_on_file_create: self.invalidate_on_file_create.clone(),
            invalidate_on_option_change: self.invalidate_on_option_change.iter().cloned().collect(),
            should_invalidate_on_startup: self.should_invalidate_on_startup,
        }
    }
}

/// Serializable invalidation record for one plugin config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRequest {
    pub id: String,
    pub plugin_name: String,
    pub search_path: ProjectPath,
    pub is_source: bool,
    pub included_files: Vec<ProjectPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidate_on_file_create: Vec<FileCreateInvalidation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidate_on_option_change: Vec<String>,
    #[serde(default)]
    pub should_invalidate_on_startup: bool,
}
