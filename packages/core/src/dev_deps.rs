// Dev Dependencies
//
// Records for build-time packages a plugin depends on, plus the
// build-scoped state shared by every worker in one build.

use crate::invalidations::FileCreateInvalidation;
use crate::paths::ProjectPath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

/// Identity of a dev dependency: what gets resolved and from where.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevDepSpecifier {
    pub specifier: String,
    pub resolve_from: ProjectPath,
}

impl DevDepSpecifier {
    pub fn new(specifier: impl Into<String>, resolve_from: impl Into<ProjectPath>) -> Self {
        DevDepSpecifier {
            specifier: specifier.into(),
            resolve_from: resolve_from.into(),
        }
    }

    /// Canonical key used for dedup and for the request-supplied hash map.
    pub fn key(&self) -> String {
        format!("{}:{}", self.specifier, self.resolve_from)
    }
}

impl From<(&str, &str)> for DevDepSpecifier {
    fn from((specifier, resolve_from): (&str, &str)) -> Self {
        DevDepSpecifier::new(specifier, ProjectPath::new(resolve_from))
    }
}

/// A dev dependency observed during a transformation, with the
/// invalidations that force its re-resolution. A record whose hash the
/// request already knew ships stripped, with empty invalidation sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevDepRequest {
    pub specifier: String,
    pub resolve_from: ProjectPath,
    pub hash: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub invalidate_on_file_change: BTreeSet<ProjectPath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidate_on_file_create: Vec<FileCreateInvalidation>,
    /// Plugins whose caches must also drop when this dependency changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_invalidations: Vec<DevDepSpecifier>,
}

impl DevDepRequest {
    /// The stripped form sent when the hash is already known upstream.
    pub fn stripped(specifier: &DevDepSpecifier, hash: impl Into<String>) -> Self {
        DevDepRequest {
            specifier: specifier.specifier.clone(),
            resolve_from: specifier.resolve_from.clone(),
            hash: hash.into(),
            invalidate_on_file_change: BTreeSet::new(),
            invalidate_on_file_create: Vec::new(),
            additional_invalidations: Vec::new(),
        }
    }
}

/// Process-wide state with a build-scoped lifecycle. The scheduler hands
/// every worker the same instance at the start of a build and replaces it
/// at build boundaries, so contents are mutable within a build but start
/// empty.
#[derive(Debug, Default)]
pub struct BuildScope {
    plugin_hashes: Mutex<HashMap<String, String>>,
    invalidated_plugins: Mutex<HashSet<String>>,
}

impl BuildScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash last sent for a plugin specifier, if any.
    pub fn cached_hash(&self, specifier: &str) -> Option<String> {
        self.plugin_hashes.lock().unwrap().get(specifier).cloned()
    }

    pub fn store_hash(&self, specifier: &str, hash: &str) {
        self.plugin_hashes
            .lock()
            .unwrap()
            .insert(specifier.to_string(), hash.to_string());
    }

    /// Mark a plugin key as invalidated. Returns true the first time only,
    /// so plugin invalidation happens once per build.
    pub fn mark_invalidated(&self, key: &str) -> bool {
        self.invalidated_plugins.lock().unwrap().insert(key.to_string())
    }
}
