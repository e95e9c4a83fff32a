// Invalidations
//
// Records telling the outer build graph when to re-run a transformation,
// and the tracker that deduplicates them while a transformation runs.

use crate::file_system::FileSystem;
use crate::hashing::{canonical_json, hash_bytes};
use crate::paths::ProjectPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;


/// A single re-run trigger: a file that was read, or a global option that
/// was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Invalidation {
    File { path: ProjectPath },
    Option { key: String },
}

impl Invalidation {
    /// Canonical identity; the result set is unique by this id.
    pub fn id(&self) -> String {
        match self {
            Invalidation::File { path } => format!("file:{}", path),
            Invalidation::Option { key } => format!("option:{}", key),
        }
    }
}

/// A pattern that invalidates when a matching file is *created*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileCreateInvalidation {
    /// A specific file that does not exist yet.
    File { path: ProjectPath },
    /// A glob over project-relative paths.
    Glob { pattern: String },
    /// A file name that invalidates when created in any directory between
    /// the project root and `above_path`. Package resolution produces these.
    FileAbove {
        file_name: String,
        above_path: ProjectPath,
    },
}

impl FileCreateInvalidation {
    pub fn id(&self) -> String {
        match self {
            FileCreateInvalidation::File { path } => format!("create-file:{}", path),
            FileCreateInvalidation::Glob { pattern } => format!("create-glob:{}", pattern),
            FileCreateInvalidation::FileAbove {
                file_name,
                above_path,
            } => format!("create-above:{}:{}", file_name, above_path),
        }
    }

    /// Whether a newly created project-relative path matches this record.
    pub fn matches(&self, created: &ProjectPath) -> bool {
        match self {
            FileCreateInvalidation::File { path } => path == created,
            FileCreateInvalidation::Glob { pattern } => glob::Pattern::new(pattern)
                .map(|pattern| pattern.matches(created.as_str()))
                .unwrap_or(false),
            FileCreateInvalidation::FileAbove {
                file_name,
                above_path,
            } => {
                let created_str = created.as_str();
                let (dir, name) = match created_str.rsplit_once('/') {
                    Some((dir, name)) => (dir, name),
                    None => ("", created_str),
                };
                name == file_name
                    && (dir.is_empty() || above_path.as_str().starts_with(&format!("{}/", dir)))
            }
        }
    }
}

/// Accumulates every invalidation observed during one transformation,
/// deduplicated by canonical id. Shared between the transformation and the
/// assets it constructs.
#[derive(Debug, Default)]
pub struct InvalidationTracker {
    invalidations: Mutex<IndexMap<String, Invalidation>>,
    file_creates: Mutex<IndexMap<String, FileCreateInvalidation>>,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, invalidation: Invalidation) {
        let mut invalidations = self.invalidations.lock().unwrap();
        invalidations.entry(invalidation.id()).or_insert(invalidation);
    }

    pub fn add_file_create(&self, invalidation: FileCreateInvalidation) {
        let mut file_creates = self.file_creates.lock().unwrap();
        file_creates.entry(invalidation.id()).or_insert(invalidation);
    }

    /// Snapshot in insertion order.
    pub fn invalidations(&self) -> Vec<Invalidation> {
        self.invalidations.lock().unwrap().values().cloned().collect()
    }

    /// Snapshot in insertion order.
    pub fn file_creates(&self) -> Vec<FileCreateInvalidation> {
        self.file_creates.lock().unwrap().values().cloned().collect()
    }
}

/// Deterministic digest over a set of invalidations. File entries fold in
/// the current content of the file; option entries fold in the canonical
/// form of the option value the upstream graph would compare against.
/// Entries are hashed in sorted-id order, so set ordering never leaks in.
pub fn invalidation_hash(
    invalidations: &[Invalidation],
    fs: &dyn FileSystem,
    project_root: &Path,
    options_value: &serde_json::Value,
) -> String {
    let mut entries: Vec<String> = invalidations
        .iter()
        .map(|invalidation| match invalidation {
            Invalidation::File { path } => {
                let absolute = path.to_absolute(project_root);
                let content_hash = fs
                    .read(&absolute)
                    .map(|bytes| hash_bytes(&bytes))
                    .unwrap_or_default();
                format!("{}={}", invalidation.id(), content_hash)
            }
            Invalidation::Option { key } => {
                let value = options_value
                    .get(key)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                format!("{}={}", invalidation.id(), canonical_json(&value))
            }
        })
        .collect();
    entries.sort();

    let mut hasher = blake3::Hasher::new();
    for entry in &entries {
        hasher.update(entry.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
