// Transformation Request
//
// The immutable, serializable input of one transformation, as dispatched
// to a worker.

use crate::dev_deps::DevDepSpecifier;
use crate::environment::Environment;
use crate::invalidations::Invalidation;
use crate::paths::ProjectPath;
use bitflags::bitflags;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

bitflags! {
    /// Why the upstream graph re-dispatched this transformation.
    /// Serialization comes with the bitflags `serde` feature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct InvalidateReason: u32 {
        const INITIAL_BUILD = 1 << 0;
        const FILE_CHANGE = 1 << 1;
        const FILE_CREATE = 1 << 2;
        const FILE_DELETE = 1 << 3;
        const STARTUP = 1 << 4;
        const OPTION_CHANGE = 1 << 5;
    }
}

impl Default for InvalidateReason {
    fn default() -> Self {
        InvalidateReason::empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationRequest {
    pub file_path: ProjectPath,
    /// Inline source, bypassing the filesystem (and the cache).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub env: Environment,
    /// Named pipeline to resolve instead of the default for this path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    /// Overrides the node_modules-based default judgment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<bool>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query: IndexMap<String, String>,
    /// Dev-dep hashes already known upstream, keyed
    /// `"specifier:resolveFrom"`. Authoritative when present.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_deps: BTreeMap<String, String>,
    /// Dev deps whose cached resolutions must be dropped before running.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidate_dev_deps: Vec<DevDepSpecifier>,
    #[serde(default)]
    pub invalidate_reason: InvalidateReason,
    /// Invalidations already attributed to this request by the upstream
    /// graph; they seed the initial cache key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidations: Vec<Invalidation>,
}

impl TransformationRequest {
    pub fn new(file_path: impl Into<ProjectPath>, env: Environment) -> Self {
        TransformationRequest {
            file_path: file_path.into(),
            code: None,
            env,
            pipeline: None,
            is_source: None,
            side_effects: None,
            query: IndexMap::new(),
            dev_deps: BTreeMap::new(),
            invalidate_dev_deps: Vec::new(),
            invalidate_reason: InvalidateReason::INITIAL_BUILD,
            invalidations: Vec::new(),
        }
    }
}

impl From<ProjectPath> for TransformationRequest {
    fn from(file_path: ProjectPath) -> Self {
        TransformationRequest::new(file_path, Environment::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod request_tests {
        use super::*;

        #[test]
        fn should_round_trip_through_serde() {
            let mut request = TransformationRequest::new(ProjectPath::new("src/a.ts"), Environment::default());
            request.invalidate_reason = InvalidateReason::FILE_CHANGE | InvalidateReason::FILE_CREATE;
            request.dev_deps.insert("t:node_modules/t".into(), "h".into());
            let json = serde_json::to_string(&request).unwrap();
            let back: TransformationRequest = serde_json::from_str(&json).unwrap();
            assert_eq!(back.file_path, request.file_path);
            assert_eq!(back.invalidate_reason, request.invalidate_reason);
            assert_eq!(back.dev_deps, request.dev_deps);
        }

        #[test]
        fn should_detect_the_file_create_bit() {
            let reason = InvalidateReason::FILE_CHANGE | InvalidateReason::FILE_CREATE;
            assert!(reason.contains(InvalidateReason::FILE_CREATE));
            assert!(!InvalidateReason::FILE_CHANGE.contains(InvalidateReason::FILE_CREATE));
        }
    }
}
