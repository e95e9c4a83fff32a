// Environment
//
// The environment descriptor attached to a transformation request and to
// every asset it produces. Hashed canonically into cache keys, so every
// field uses a deterministic representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the output of a transformation is meant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentContext {
    Browser,
    WebWorker,
    ServiceWorker,
    Node,
    ElectronMain,
    ElectronRenderer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildMode {
    Development,
    Production,
}

/// Environment descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub context: EnvironmentContext,
    /// Minimum supported engine versions, keyed by engine name. A sorted
    /// map keeps the canonical hash independent of declaration order.
    #[serde(default)]
    pub engines: BTreeMap<String, String>,
    pub mode: BuildMode,
    #[serde(default)]
    pub should_scope_hoist: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            context: EnvironmentContext::Browser,
            engines: BTreeMap::new(),
            mode: BuildMode::Development,
            should_scope_hoist: false,
        }
    }
}
