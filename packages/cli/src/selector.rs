// Pipeline Map
//
// The CLI's stand-in for the external plugin configuration: a JSON file
// mapping file types to ordered lists of built-in transformer names.

use crate::transformers::built_in;
use quarry_core::diagnostics::{Diagnostic, DiagnosticError};
use quarry_core::paths::ProjectPath;
use quarry_core::plugin::{PipelineSelector, TransformerEntry};
use quarry_core::resolver::PipelineResolver;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMap {
    /// File type (extension) to ordered transformer names.
    pub pipelines: HashMap<String, Vec<String>>,
    /// Named pipelines, selectable per request.
    #[serde(default)]
    pub named_pipelines: HashMap<String, Vec<String>>,
}

impl PipelineMap {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let map: PipelineMap = serde_json::from_str(&content)?;
        Ok(map)
    }

    /// A default map covering the built-in transformers.
    pub fn default_map() -> Self {
        let mut pipelines = HashMap::new();
        pipelines.insert("json".to_string(), vec!["json-to-js".to_string()]);
        pipelines.insert("ts".to_string(), vec!["ts-to-js".to_string()]);
        pipelines.insert("js".to_string(), vec!["js-minify".to_string()]);
        PipelineMap {
            pipelines,
            named_pipelines: HashMap::new(),
        }
    }
}

/// Selector serving transformer entries from a [`PipelineMap`].
pub struct MapSelector {
    map: PipelineMap,
    config_path: ProjectPath,
    resolver: Arc<dyn PipelineResolver>,
}

impl MapSelector {
    pub fn new(
        map: PipelineMap,
        config_path: ProjectPath,
        resolver: Arc<dyn PipelineResolver>,
    ) -> Self {
        MapSelector {
            map,
            config_path,
            resolver,
        }
    }

    fn entries_for(&self, names: &[String]) -> Result<Vec<TransformerEntry>, DiagnosticError> {
        names
            .iter()
            .map(|name| {
                let plugin = built_in(name).ok_or_else(|| {
                    DiagnosticError::from(
                        Diagnostic::new("quarry", format!("Unknown transformer '{}'", name))
                            .with_hint("available: passthrough, json-to-js, ts-to-js, js-minify"),
                    )
                })?;
                Ok(TransformerEntry {
                    name: name.clone(),
                    resolve_from: ProjectPath::new(format!("node_modules/{}", name)),
                    plugin,
                    config_key_path: Some(format!("pipelines.{}", name)),
                })
            })
            .collect()
    }
}

impl PipelineSelector for MapSelector {
    fn transformers_for(
        &self,
        path: &ProjectPath,
        pipeline: Option<&str>,
        _is_source: bool,
    ) -> Result<Vec<TransformerEntry>, DiagnosticError> {
        if let Some(name) = pipeline {
            if let Some(names) = self.map.named_pipelines.get(name) {
                return self.entries_for(names);
            }
        }
        let asset_type = path.extension().unwrap_or("");
        match self.map.pipelines.get(asset_type) {
            Some(names) => self.entries_for(names),
            None => Ok(Vec::new()),
        }
    }

    fn invalidate_plugin(&self, _specifier: &str) {}

    fn resolver(&self) -> Arc<dyn PipelineResolver> {
        self.resolver.clone()
    }

    fn config_path(&self) -> Option<ProjectPath> {
        Some(self.config_path.clone())
    }
}
