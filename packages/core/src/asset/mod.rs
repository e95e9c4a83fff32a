// Assets
//
// The asset data model: the canonical serializable value record, the
// mutable asset under construction inside a transformation, and the facade
// transformer plugins mutate. Plugins never hold the record itself; the
// facade-to-record bridge keeps plugin references from outliving the
// transformation.

use crate::environment::Environment;
use crate::hashing::{canonical_json, hash_bytes, hash_string};
use crate::invalidations::InvalidationTracker;
use crate::paths::ProjectPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(test)]
mod test;

/// Opaque parsed representation produced by one transformer and optionally
/// reused by the next. The core never looks inside; plugins downcast.
#[derive(Clone)]
pub struct Ast {
    program: Arc<dyn Any + Send + Sync>,
}

impl Ast {
    pub fn new<T: Any + Send + Sync>(program: T) -> Self {
        Ast {
            program: Arc::new(program),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.program.downcast_ref::<T>()
    }
}

impl fmt::Debug for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ast(..)")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub size: u64,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSymbol {
    /// Local name the exported symbol binds to.
    pub local: String,
}

pub type AssetSymbols = IndexMap<String, AssetSymbol>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecifierType {
    #[default]
    Esm,
    CommonJs,
    Url,
}

/// A dependency as plugins declare it, with absolute paths.
#[derive(Debug, Clone, Default)]
pub struct DependencyDescriptor {
    pub specifier: String,
    pub specifier_type: SpecifierType,
    /// Absolute path to resolve from, when not the source file itself.
    pub resolve_from: Option<PathBuf>,
    pub pipeline: Option<String>,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

/// A dependency while the owning asset is still under construction.
/// Carries bookkeeping the public record strips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDependency {
    pub id: String,
    pub source_asset_id: String,
    pub source_path: Option<ProjectPath>,
    pub specifier: String,
    pub specifier_type: SpecifierType,
    pub resolve_from: Option<ProjectPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl PendingDependency {
    /// The outward form: internal identifiers stripped, `resolve_from`
    /// converted back to an absolute path.
    pub fn to_public(&self, project_root: &Path) -> Dependency {
        Dependency {
            specifier: self.specifier.clone(),
            specifier_type: self.specifier_type,
            resolve_from: self
                .resolve_from
                .as_ref()
                .map(|path| path.to_absolute(project_root)),
            pipeline: self.pipeline.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// A dependency as it leaves the transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub specifier: String,
    pub specifier_type: SpecifierType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve_from: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

/// The canonical, serializable record of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetValue {
    pub id: String,
    pub file_path: ProjectPath,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub env: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_key: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query: IndexMap<String, String>,
    pub is_source: bool,
    pub side_effects: bool,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub is_isolated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_key: Option<String>,
    #[serde(default)]
    pub stats: AssetStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<AssetSymbols>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
    /// Name of the transformer that produced this asset, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<ProjectPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_key_path: Option<String>,
}

fn environment_fingerprint(env: &Environment) -> String {
    serde_json::to_value(env)
        .map(|value| canonical_json(&value))
        .unwrap_or_default()
}

/// A mutable asset under construction inside one transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncommittedAsset {
    pub value: AssetValue,
    /// Stable base identity of the initial source within one build.
    pub id_base: String,
    pub content: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_buffer: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_dependencies: Vec<PendingDependency>,
    #[serde(skip)]
    pub ast: Option<Ast>,
    #[serde(skip)]
    pub is_ast_dirty: bool,
    /// Shared with the owning transformation.
    #[serde(skip)]
    pub invalidations: Arc<InvalidationTracker>,
}

impl UncommittedAsset {
    pub fn new(
        value: AssetValue,
        id_base: String,
        content: Vec<u8>,
        invalidations: Arc<InvalidationTracker>,
    ) -> Self {
        let mut asset = UncommittedAsset {
            value,
            id_base,
            content,
            map_buffer: None,
            pending_dependencies: Vec::new(),
            ast: None,
            is_ast_dirty: false,
            invalidations,
        };
        asset.value.id = asset.compute_id();
        asset
    }

    /// Rebuild an asset from a cached record plus its content blobs.
    pub fn from_cache(
        value: AssetValue,
        id_base: String,
        content: Vec<u8>,
        map_buffer: Option<Vec<u8>>,
        invalidations: Arc<InvalidationTracker>,
    ) -> Self {
        UncommittedAsset {
            value,
            id_base,
            content,
            map_buffer,
            pending_dependencies: Vec::new(),
            ast: None,
            is_ast_dirty: false,
            invalidations,
        }
    }

    /// Identity derived from the base id plus everything that forks an
    /// asset off its source: type, environment, unique key, pipeline, query.
    pub fn compute_id(&self) -> String {
        let mut input = format!(
            "{}:{}:{}",
            self.id_base,
            self.value.asset_type,
            environment_fingerprint(&self.value.env)
        );
        if let Some(unique_key) = &self.value.unique_key {
            input.push(':');
            input.push_str(unique_key);
        }
        if let Some(pipeline) = &self.value.pipeline {
            input.push(':');
            input.push_str(pipeline);
        }
        let mut query: Vec<(&String, &String)> = self.value.query.iter().collect();
        query.sort();
        for (key, value) in query {
            input.push(':');
            input.push_str(key);
            input.push('=');
            input.push_str(value);
        }
        hash_string(&input)
    }

    pub fn set_ast(&mut self, ast: Ast, dirty: bool) {
        self.ast = Some(ast);
        self.is_ast_dirty = dirty;
    }

    pub fn clear_ast(&mut self) {
        self.ast = None;
        self.is_ast_dirty = false;
    }

    /// Finalize the value record: content hash, stats, id, public
    /// dependencies. Idempotent. An asset rebuilt from cache keeps the
    /// published dependencies it was cached with.
    pub fn commit(&mut self, project_root: &Path) {
        self.value.content_hash = Some(hash_bytes(&self.content));
        self.value.stats.size = self.content.len() as u64;
        self.value.id = self.compute_id();
        if !self.pending_dependencies.is_empty() {
            self.value.dependencies = self
                .pending_dependencies
                .iter()
                .map(|dependency| dependency.to_public(project_root))
                .collect();
        }
    }
}

/// The mutable view a transformer receives. Mutations land on the
/// underlying asset; the facade itself holds no state.
pub struct MutableAsset<'a> {
    asset: &'a mut UncommittedAsset,
    project_root: &'a Path,
}

impl<'a> MutableAsset<'a> {
    pub fn new(asset: &'a mut UncommittedAsset, project_root: &'a Path) -> Self {
        MutableAsset {
            asset,
            project_root,
        }
    }

    /// Absolute path of the source file, the representation plugins see.
    pub fn file_path(&self) -> PathBuf {
        self.asset.value.file_path.to_absolute(self.project_root)
    }

    pub fn asset_type(&self) -> &str {
        &self.asset.value.asset_type
    }

    pub fn set_type(&mut self, asset_type: impl Into<String>) {
        self.asset.value.asset_type = asset_type.into();
    }

    pub fn env(&self) -> &Environment {
        &self.asset.value.env
    }

    pub fn query(&self) -> &IndexMap<String, String> {
        &self.asset.value.query
    }

    pub fn is_source(&self) -> bool {
        self.asset.value.is_source
    }

    pub fn pipeline(&self) -> Option<&str> {
        self.asset.value.pipeline.as_deref()
    }

    pub fn content_bytes(&self) -> &[u8] {
        &self.asset.content
    }

    pub fn content_string(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.asset.content)
    }

    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.asset.content = content.into();
    }

    pub fn set_map(&mut self, map: Option<Vec<u8>>) {
        self.asset.map_buffer = map;
    }

    pub fn ast(&self) -> Option<Ast> {
        self.asset.ast.clone()
    }

    /// Attach a (new or mutated) AST. Content is regenerated from it later.
    pub fn set_ast(&mut self, ast: Ast) {
        self.asset.set_ast(ast, true);
    }

    pub fn symbols(&self) -> Option<&AssetSymbols> {
        self.asset.value.symbols.as_ref()
    }

    pub fn set_symbols(&mut self, symbols: AssetSymbols) {
        self.asset.value.symbols = Some(symbols);
    }

    pub fn set_side_effects(&mut self, side_effects: bool) {
        self.asset.value.side_effects = side_effects;
    }

    pub fn set_unique_key(&mut self, unique_key: impl Into<String>) {
        self.asset.value.unique_key = Some(unique_key.into());
    }

    pub fn set_is_inline(&mut self, is_inline: bool) {
        self.asset.value.is_inline = is_inline;
    }

    pub fn meta_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.asset.value.meta
    }

    /// Declare a dependency of this asset. Returns the dependency id.
    pub fn add_dependency(&mut self, descriptor: DependencyDescriptor) -> String {
        let resolve_from = descriptor
            .resolve_from
            .as_ref()
            .map(|path| ProjectPath::from_absolute(self.project_root, path));
        let id = hash_string(&format!(
            "{}:{}:{:?}",
            self.asset.value.id, descriptor.specifier, descriptor.specifier_type
        ));
        self.asset.pending_dependencies.push(PendingDependency {
            id: id.clone(),
            source_asset_id: self.asset.value.id.clone(),
            source_path: Some(self.asset.value.file_path.clone()),
            specifier: descriptor.specifier,
            specifier_type: descriptor.specifier_type,
            resolve_from,
            pipeline: descriptor.pipeline,
            meta: descriptor.meta,
        });
        id
    }
}
