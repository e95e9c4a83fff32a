// Testing Support
//
// In-memory hosts and builders used by the crate's tests. Kept as a
// regular module so downstream crates can drive the core without a real
// filesystem, cache, or package manager.

use crate::asset::{AssetStats, AssetValue};
use crate::cache::Cache;
use crate::diagnostics::DiagnosticError;
use crate::environment::Environment;
use crate::file_system::FileSystem;
use crate::logging::{LogLevel, NullLogger};
use crate::options::TransformOptions;
use crate::package_manager::{PackageInvalidations, PackageManager};
use crate::paths::ProjectPath;
use crate::plugin::{
    CanReuseAstFn, GenerateFn, LoadConfigFn, ParseFn, PipelineSelector, TransformFn, Transformer,
    TransformerEntry, TransformerOutput,
};
use crate::reporter::{Reporter, ReporterEvent};
use crate::resolver::{PipelineResolver, ResolverResult};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory file system.
#[derive(Default)]
pub struct MockFileSystem {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: PathBuf, content: Vec<u8>) {
        self.files.lock().unwrap().insert(path, content);
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }
}

/// In-memory cache that records reads, so tests can assert the cache was
/// or was not consulted.
#[derive(Default)]
pub struct MemoryCache {
    values: Mutex<HashMap<String, Vec<u8>>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    reads: Mutex<Vec<String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    pub fn value_count(&self) -> usize {
        self.values.lock().unwrap().len()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.reads.lock().unwrap().push(key.to_string());
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    fn get_blob(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(key).cloned()
    }

    fn set_blob(&self, key: &str, value: Vec<u8>) {
        self.blobs.lock().unwrap().insert(key.to_string(), value);
    }
}

/// Package manager whose resolutions and invalidations are scripted by the
/// test. Records which specifiers were asked for invalidations.
#[derive(Default)]
pub struct MockPackageManager {
    invalidations: Mutex<HashMap<String, PackageInvalidations>>,
    invalidation_queries: Mutex<Vec<String>>,
    invalidate_calls: Mutex<Vec<String>>,
}

impl MockPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_invalidations(&self, specifier: &str, invalidations: PackageInvalidations) {
        self.invalidations
            .lock()
            .unwrap()
            .insert(specifier.to_string(), invalidations);
    }

    /// Specifiers whose invalidations were queried.
    pub fn invalidation_queries(&self) -> Vec<String> {
        self.invalidation_queries.lock().unwrap().clone()
    }

    /// Specifiers explicitly invalidated.
    pub fn invalidate_calls(&self) -> Vec<String> {
        self.invalidate_calls.lock().unwrap().clone()
    }
}

impl PackageManager for MockPackageManager {
    fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf, DiagnosticError> {
        Ok(from.join(specifier).join("index.js"))
    }

    fn invalidate(&self, specifier: &str, _from: &Path) {
        self.invalidate_calls.lock().unwrap().push(specifier.to_string());
    }

    fn get_invalidations(&self, specifier: &str, _from: &Path) -> PackageInvalidations {
        self.invalidation_queries
            .lock()
            .unwrap()
            .push(specifier.to_string());
        self.invalidations
            .lock()
            .unwrap()
            .get(specifier)
            .cloned()
            .unwrap_or_default()
    }
}

/// Resolver that treats every specifier as already absolute.
pub struct NullResolver;

impl PipelineResolver for NullResolver {
    fn resolve(&self, specifier: &str, _from: &Path) -> Result<ResolverResult, DiagnosticError> {
        Ok(ResolverResult {
            file_path: PathBuf::from(specifier),
            ..ResolverResult::default()
        })
    }
}

/// Resolver with scripted results keyed by specifier.
#[derive(Default)]
pub struct MockResolver {
    results: Mutex<HashMap<String, ResolverResult>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, specifier: &str, result: ResolverResult) {
        self.results
            .lock()
            .unwrap()
            .insert(specifier.to_string(), result);
    }
}

impl PipelineResolver for MockResolver {
    fn resolve(&self, specifier: &str, from: &Path) -> Result<ResolverResult, DiagnosticError> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(specifier)
            .cloned()
            .unwrap_or_else(|| ResolverResult {
                file_path: from.with_file_name(specifier),
                ..ResolverResult::default()
            }))
    }
}

/// Reporter that stores every event.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReporterEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReporterEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &ReporterEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Pipeline selector with a fixed transformer table keyed by file type and
/// optional pipeline name.
pub struct StaticSelector {
    by_type: Mutex<HashMap<(String, Option<String>), Vec<TransformerEntry>>>,
    invalidated: Mutex<Vec<String>>,
    resolver: Arc<dyn PipelineResolver>,
    config_path: Option<ProjectPath>,
}

impl StaticSelector {
    pub fn new() -> Self {
        StaticSelector {
            by_type: Mutex::new(HashMap::new()),
            invalidated: Mutex::new(Vec::new()),
            resolver: Arc::new(NullResolver),
            config_path: Some(ProjectPath::new("quarry.config.json")),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn PipelineResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn add(&self, asset_type: &str, entries: Vec<TransformerEntry>) {
        self.by_type
            .lock()
            .unwrap()
            .insert((asset_type.to_string(), None), entries);
    }

    pub fn add_named(&self, asset_type: &str, pipeline: &str, entries: Vec<TransformerEntry>) {
        self.by_type
            .lock()
            .unwrap()
            .insert((asset_type.to_string(), Some(pipeline.to_string())), entries);
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }
}

impl PipelineSelector for StaticSelector {
    fn transformers_for(
        &self,
        path: &ProjectPath,
        pipeline: Option<&str>,
        _is_source: bool,
    ) -> Result<Vec<TransformerEntry>, DiagnosticError> {
        let asset_type = path.extension().unwrap_or("").to_string();
        let by_type = self.by_type.lock().unwrap();
        if let Some(entries) = by_type.get(&(asset_type.clone(), pipeline.map(str::to_string))) {
            return Ok(entries.clone());
        }
        Ok(by_type
            .get(&(asset_type, None))
            .cloned()
            .unwrap_or_default())
    }

    fn invalidate_plugin(&self, specifier: &str) {
        self.invalidated.lock().unwrap().push(specifier.to_string());
    }

    fn resolver(&self) -> Arc<dyn PipelineResolver> {
        self.resolver.clone()
    }

    fn config_path(&self) -> Option<ProjectPath> {
        self.config_path.clone()
    }
}

/// Builder for test transformers.
#[derive(Default)]
pub struct TransformerBuilder {
    load_config: Option<LoadConfigFn>,
    can_reuse_ast: Option<CanReuseAstFn>,
    parse: Option<ParseFn>,
    transform: Option<TransformFn>,
    generate: Option<GenerateFn>,
}

impl TransformerBuilder {
    pub fn load_config(mut self, hook: LoadConfigFn) -> Self {
        self.load_config = Some(hook);
        self
    }

    pub fn can_reuse_ast(mut self, hook: CanReuseAstFn) -> Self {
        self.can_reuse_ast = Some(hook);
        self
    }

    pub fn parse(mut self, hook: ParseFn) -> Self {
        self.parse = Some(hook);
        self
    }

    pub fn transform(mut self, hook: TransformFn) -> Self {
        self.transform = Some(hook);
        self
    }

    pub fn generate(mut self, hook: GenerateFn) -> Self {
        self.generate = Some(hook);
        self
    }

    pub fn build(self) -> Arc<Transformer> {
        Arc::new(Transformer {
            load_config: self.load_config,
            can_reuse_ast: self.can_reuse_ast,
            parse: self.parse,
            transform: self
                .transform
                .unwrap_or_else(|| Box::new(|_input| Ok(vec![TransformerOutput::Input]))),
            generate: self.generate,
        })
    }
}

pub fn transformer() -> TransformerBuilder {
    TransformerBuilder::default()
}

/// A transformer that passes its input through unchanged.
pub fn noop_transformer() -> Arc<Transformer> {
    transformer().build()
}

pub fn transformer_entry(name: &str, plugin: Arc<Transformer>) -> TransformerEntry {
    TransformerEntry {
        name: name.to_string(),
        resolve_from: ProjectPath::new(format!("node_modules/{}", name)),
        plugin,
        config_key_path: None,
    }
}

pub fn asset_value(file_path: &str, asset_type: &str) -> AssetValue {
    AssetValue {
        id: String::new(),
        file_path: ProjectPath::new(file_path),
        asset_type: asset_type.to_string(),
        env: Environment::default(),
        content_hash: None,
        content_key: None,
        map_key: None,
        query: IndexMap::new(),
        is_source: true,
        side_effects: true,
        is_inline: false,
        is_isolated: false,
        pipeline: None,
        unique_key: None,
        stats: AssetStats::default(),
        symbols: None,
        dependencies: Vec::new(),
        meta: serde_json::Map::new(),
        plugin: None,
        config_path: None,
        config_key_path: None,
    }
}

pub fn test_options(project_root: &str) -> TransformOptions {
    TransformOptions {
        project_root: PathBuf::from(project_root),
        should_use_cache: true,
        env: Default::default(),
        log_level: LogLevel::Error,
    }
}

/// The default no-op logger for tests.
pub fn test_logger() -> Arc<NullLogger> {
    Arc::new(NullLogger)
}
