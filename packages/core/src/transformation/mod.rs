// Transformation
//
// The per-file unit of work: load an asset, resolve its transformer
// pipeline, run the pipeline (chaining into other pipelines when the asset
// type changes), consult and fill the cache, and account for every
// invalidation and dev dependency observed along the way. One instance
// runs per request inside a worker; instances never share mutable state
// except the injected build scope.

use crate::asset::{AssetStats, AssetValue, MutableAsset, UncommittedAsset};
use crate::cache::Cache;
use crate::constants::QUARRY_VERSION;
use crate::dev_deps::{BuildScope, DevDepRequest, DevDepSpecifier};
use crate::diagnostics::{Diagnostic, DiagnosticError, CORE_ORIGIN};
use crate::environment::{BuildMode, Environment};
use crate::file_system::FileSystem;
use crate::hashing::{hash_bytes, hash_object};
use crate::invalidations::{
    invalidation_hash, FileCreateInvalidation, Invalidation, InvalidationTracker,
};
use crate::logging::{Logger, PluginLogger};
use crate::options::TransformOptions;
use crate::package_manager::PackageManager;
use crate::paths::ProjectPath;
use crate::pipeline::{Pipeline, PipelineGenerate};
use crate::plugin::{
    CreatedAsset, ParseInput, PipelineSelector, TransformInput, TransformerEntry, TransformerOutput,
};
use crate::plugin_config::{ConfigRequest, PluginConfig};
use crate::reporter::{BuildPhase, Reporter, ReporterEvent};
use crate::request::{InvalidateReason, TransformationRequest};
use crate::source_map;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(test)]
mod test;

/// The collaborators a transformation is constructed with. All handles are
/// shared; the worker reuses one context across many transformations.
#[derive(Clone)]
pub struct TransformationContext {
    pub options: Arc<TransformOptions>,
    pub selector: Arc<dyn PipelineSelector>,
    pub fs: Arc<dyn FileSystem>,
    pub cache: Arc<dyn Cache>,
    pub package_manager: Arc<dyn PackageManager>,
    pub reporter: Arc<dyn Reporter>,
    pub logger: Arc<dyn Logger>,
    pub build: Arc<BuildScope>,
}

/// Everything a finished transformation reports back to the build graph.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationResult {
    pub assets: Vec<UncommittedAsset>,
    pub config_requests: Vec<ConfigRequest>,
    pub invalidations: Vec<Invalidation>,
    pub invalidate_on_file_create: Vec<FileCreateInvalidation>,
    pub dev_dep_requests: Vec<DevDepRequest>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedAssetRecord {
    value: AssetValue,
    id_base: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedPipelineEntry {
    assets: Vec<CachedAssetRecord>,
    #[serde(default)]
    invalidations: Vec<Invalidation>,
    #[serde(default)]
    invalidate_on_file_create: Vec<FileCreateInvalidation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheKeyAsset<'a> {
    file_path: &'a ProjectPath,
    pipeline: Option<&'a String>,
    hash: Option<&'a String>,
    unique_key: Option<&'a String>,
    query: Vec<(&'a String, &'a String)>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheKeyInput<'a> {
    bundler_version: &'a str,
    assets: Vec<CacheKeyAsset<'a>>,
    env: &'a Environment,
    invalidation_hash: &'a str,
    pipeline_hash: &'a str,
}

/// One transformation of one source file (or inline code blob).
pub struct Transformation {
    request: TransformationRequest,
    options: Arc<TransformOptions>,
    selector: Arc<dyn PipelineSelector>,
    fs: Arc<dyn FileSystem>,
    cache: Arc<dyn Cache>,
    package_manager: Arc<dyn PackageManager>,
    reporter: Arc<dyn Reporter>,
    logger: Arc<dyn Logger>,
    build: Arc<BuildScope>,
    invalidations: Arc<InvalidationTracker>,
    configs: IndexMap<String, PluginConfig>,
    dev_dep_requests: IndexMap<String, DevDepRequest>,
}

impl Transformation {
    pub fn new(request: TransformationRequest, ctx: TransformationContext) -> Self {
        Transformation {
            request,
            options: ctx.options,
            selector: ctx.selector,
            fs: ctx.fs,
            cache: ctx.cache,
            package_manager: ctx.package_manager,
            reporter: ctx.reporter,
            logger: ctx.logger,
            build: ctx.build,
            invalidations: Arc::new(InvalidationTracker::new()),
            configs: IndexMap::new(),
            dev_dep_requests: IndexMap::new(),
        }
    }

    pub fn run(mut self) -> Result<TransformationResult, DiagnosticError> {
        let absolute_path = self.request.file_path.to_absolute(&self.options.project_root);
        self.reporter.report(&ReporterEvent::BuildProgress {
            phase: BuildPhase::Transforming,
            file_path: absolute_path.clone(),
        });

        let mut asset = self.load_asset()?;

        if self.request.code.is_none() && source_map::supports_source_maps(&asset.value.asset_type)
        {
            let content = String::from_utf8_lossy(&asset.content).into_owned();
            match source_map::load_existing_source_map(self.fs.as_ref(), &absolute_path, &content) {
                Ok(Some(map)) => asset.map_buffer = Some(map),
                Ok(None) => {}
                Err(err) => self.logger.debug(&format!(
                    "Could not load existing source map for {}: {}",
                    absolute_path.display(),
                    err
                )),
            }
        }

        for dep in &self.request.invalidate_dev_deps {
            if self.build.mark_invalidated(&dep.key()) {
                self.selector.invalidate_plugin(&dep.specifier);
                self.package_manager.invalidate(
                    &dep.specifier,
                    &dep.resolve_from.to_absolute(&self.options.project_root),
                );
            }
        }

        let path = self.request.file_path.clone();
        let pipeline_name = self.request.pipeline.clone();
        let is_source = asset.value.is_source;
        let mut pipeline = self.load_pipeline(&path, is_source, pipeline_name.as_deref())?;
        let mut assets = self.run_pipelines(&mut pipeline, asset)?;
        for asset in &mut assets {
            asset.commit(&self.options.project_root);
        }

        let config_requests = self
            .configs
            .values()
            .filter(|config| !config.is_empty())
            .map(|config| config.to_request())
            .collect();

        let mut dev_dep_requests = Vec::with_capacity(self.dev_dep_requests.len());
        for request in self.dev_dep_requests.values() {
            match self.build.cached_hash(&request.specifier) {
                Some(hash) if hash == request.hash => {
                    let dep =
                        DevDepSpecifier::new(request.specifier.clone(), request.resolve_from.clone());
                    dev_dep_requests.push(DevDepRequest::stripped(&dep, &request.hash));
                }
                _ => {
                    self.build.store_hash(&request.specifier, &request.hash);
                    dev_dep_requests.push(request.clone());
                }
            }
        }

        Ok(TransformationResult {
            assets,
            config_requests,
            invalidations: self.invalidations.invalidations(),
            invalidate_on_file_create: self.invalidations.file_creates(),
            dev_dep_requests,
        })
    }

    /// Read the source (inline or from disk) and construct the initial
    /// asset: type from the file extension, `id_base` from the content hash
    /// for inline code and from the project-relative path otherwise.
    fn load_asset(&self) -> Result<UncommittedAsset, DiagnosticError> {
        let file_path = &self.request.file_path;
        let absolute = file_path.to_absolute(&self.options.project_root);
        let content = match &self.request.code {
            Some(code) => code.clone().into_bytes(),
            None => self.fs.read(&absolute).map_err(|err| {
                DiagnosticError::from(
                    Diagnostic::new(
                        CORE_ORIGIN,
                        format!("Failed to read {}: {}", absolute.display(), err),
                    )
                    .with_file_path(absolute.to_string_lossy()),
                )
            })?,
        };
        let content_hash = hash_bytes(&content);
        let id_base = if self.request.code.is_some() {
            content_hash.clone()
        } else {
            file_path.as_str().to_string()
        };
        let is_source = self
            .request
            .is_source
            .unwrap_or_else(|| !file_path.as_str().contains("node_modules"));
        let size = content.len() as u64;
        let value = AssetValue {
            id: String::new(),
            file_path: file_path.clone(),
            asset_type: file_path.extension().unwrap_or("").to_string(),
            env: self.request.env.clone(),
            content_hash: Some(content_hash),
            content_key: None,
            map_key: None,
            query: self.request.query.clone(),
            is_source,
            side_effects: self.request.side_effects.unwrap_or(true),
            is_inline: false,
            is_isolated: false,
            pipeline: self.request.pipeline.clone(),
            unique_key: None,
            stats: AssetStats { size, time: 0 },
            symbols: None,
            dependencies: Vec::new(),
            meta: serde_json::Map::new(),
            plugin: None,
            config_path: None,
            config_key_path: None,
        };
        Ok(UncommittedAsset::new(
            value,
            id_base,
            content,
            self.invalidations.clone(),
        ))
    }

    /// Resolve the ordered transformer list for a path and load each
    /// transformer's config.
    fn load_pipeline(
        &mut self,
        path: &ProjectPath,
        is_source: bool,
        pipeline_name: Option<&str>,
    ) -> Result<Pipeline, DiagnosticError> {
        let transformers = self
            .selector
            .transformers_for(path, pipeline_name, is_source)?;
        for entry in &transformers {
            if entry.plugin.load_config.is_some() {
                let config = self.load_plugin_config(entry, path, is_source)?;
                self.configs.insert(entry.name.clone(), config);
            }
        }
        Ok(Pipeline::new(transformers, self.selector.resolver()))
    }

    /// Invoke a transformer's `load_config` hook and register its declared
    /// dev dependencies.
    fn load_plugin_config(
        &mut self,
        entry: &TransformerEntry,
        search_path: &ProjectPath,
        is_source: bool,
    ) -> Result<PluginConfig, DiagnosticError> {
        let mut config = PluginConfig::new(
            entry.name.clone(),
            search_path.clone(),
            is_source,
            self.request.env.clone(),
        );
        if let Some(load_config) = &entry.plugin.load_config {
            let logger = PluginLogger::new(&entry.name, self.logger.as_ref());
            let absolute = search_path.to_absolute(&self.options.project_root);
            load_config(&mut config, &self.options, &logger)
                .map_err(|err| err.attributed_to(&entry.name, &absolute.to_string_lossy()))?;
        }
        for dep in config.dev_deps.clone() {
            self.add_dev_dependency(dep, None)?;
        }
        Ok(config)
    }

    /// Record a dev dependency once per canonical key. A request-supplied
    /// hash is authoritative and short-circuits resolution entirely; the
    /// upstream graph will not re-run an unchanged dependency.
    fn add_dev_dependency(
        &mut self,
        dep: DevDepSpecifier,
        owner: Option<&TransformerEntry>,
    ) -> Result<(), DiagnosticError> {
        let key = dep.key();
        if self.dev_dep_requests.contains_key(&key) {
            return Ok(());
        }
        if let Some(hash) = self.request.dev_deps.get(&key) {
            let record = DevDepRequest::stripped(&dep, hash);
            self.dev_dep_requests.insert(key, record);
            return Ok(());
        }

        let resolve_from = dep.resolve_from.to_absolute(&self.options.project_root);
        self.package_manager.resolve(&dep.specifier, &resolve_from)?;
        let package_invalidations = self
            .package_manager
            .get_invalidations(&dep.specifier, &resolve_from);

        let change_paths: std::collections::BTreeSet<ProjectPath> = package_invalidations
            .invalidate_on_file_change
            .iter()
            .map(|path| ProjectPath::from_absolute(&self.options.project_root, path))
            .collect();
        let file_invalidations: Vec<Invalidation> = change_paths
            .iter()
            .cloned()
            .map(|path| Invalidation::File { path })
            .collect();
        let options_value = self.options_value()?;
        let hash = invalidation_hash(
            &file_invalidations,
            self.fs.as_ref(),
            &self.options.project_root,
            &options_value,
        );

        let record = DevDepRequest {
            specifier: dep.specifier.clone(),
            resolve_from: dep.resolve_from.clone(),
            hash,
            invalidate_on_file_change: change_paths,
            invalidate_on_file_create: package_invalidations.invalidate_on_file_create,
            additional_invalidations: owner
                .map(|entry| vec![DevDepSpecifier::new(entry.name.clone(), entry.resolve_from.clone())])
                .unwrap_or_default(),
        };
        self.dev_dep_requests.insert(key, record);
        Ok(())
    }

    fn options_value(&self) -> Result<serde_json::Value, DiagnosticError> {
        serde_json::to_value(self.options.as_ref()).map_err(|err| {
            DiagnosticError::new(CORE_ORIGIN, format!("Failed to serialize options: {}", err))
        })
    }

    /// Digest of everything that can change a pipeline's behavior: each
    /// transformer's dev-dep hash and config state, in order.
    fn pipeline_hash(&self, pipeline: &Pipeline) -> Result<String, DiagnosticError> {
        let mut hasher = blake3::Hasher::new();
        for entry in &pipeline.transformers {
            let key = DevDepSpecifier::new(entry.name.clone(), entry.resolve_from.clone()).key();
            let dev_dep_hash = self
                .request
                .dev_deps
                .get(&key)
                .cloned()
                .or_else(|| {
                    self.dev_dep_requests
                        .get(&key)
                        .map(|request| request.hash.clone())
                })
                .unwrap_or_default();
            hasher.update(dev_dep_hash.as_bytes());

            let config = match self.configs.get(&entry.name) {
                Some(config) => config,
                None => continue,
            };
            hasher.update(config.id.as_bytes());
            if let Some(result_hash) = &config.result_hash {
                hasher.update(result_hash.as_bytes());
            } else if !config.included_files.is_empty() {
                let file_invalidations: Vec<Invalidation> = config
                    .included_files
                    .iter()
                    .map(|path| Invalidation::File { path: path.clone() })
                    .collect();
                let options_value = self.options_value()?;
                let files_hash = invalidation_hash(
                    &file_invalidations,
                    self.fs.as_ref(),
                    &self.options.project_root,
                    &options_value,
                );
                hasher.update(files_hash.as_bytes());
            } else if let Some(result) = &config.result {
                let canonical = result.canonical().map_err(|err| {
                    DiagnosticError::from(Diagnostic::new(
                        config.plugin_name.clone(),
                        format!(
                            "Config result is not hashable: {}. Set a result hash on the config instead.",
                            err
                        ),
                    ))
                })?;
                hasher.update(canonical.as_bytes());
            }
            for dep in &config.dev_deps {
                let recorded = self.dev_dep_requests.get(&dep.key()).ok_or_else(|| {
                    DiagnosticError::new(
                        CORE_ORIGIN,
                        format!(
                            "Missing dev dependency hash for {} declared by {}",
                            dep.key(),
                            config.plugin_name
                        ),
                    )
                })?;
                hasher.update(recorded.hash.as_bytes());
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Deterministic cache key over the asset snapshots, environment,
    /// invalidation hash, pipeline hash, and bundler version.
    fn cache_key(
        &self,
        values: &[&AssetValue],
        invalidation_hash: &str,
        pipeline_hash: &str,
    ) -> Result<String, DiagnosticError> {
        let assets = values
            .iter()
            .map(|value| {
                let mut query: Vec<(&String, &String)> = value.query.iter().collect();
                query.sort();
                CacheKeyAsset {
                    file_path: &value.file_path,
                    pipeline: value.pipeline.as_ref(),
                    hash: value.content_hash.as_ref(),
                    unique_key: value.unique_key.as_ref(),
                    query,
                }
            })
            .collect();
        let input = CacheKeyInput {
            bundler_version: QUARRY_VERSION,
            assets,
            env: &self.request.env,
            invalidation_hash,
            pipeline_hash,
        };
        hash_object(&input).map_err(|err| {
            DiagnosticError::new(CORE_ORIGIN, format!("Failed to hash cache key: {}", err))
        })
    }

    /// Run one pipeline over the initial asset, reading and filling the
    /// cache around the execution, then chain every output whose type
    /// changed into its follow-up pipeline.
    fn run_pipelines(
        &mut self,
        pipeline: &mut Pipeline,
        initial: UncommittedAsset,
    ) -> Result<Vec<UncommittedAsset>, DiagnosticError> {
        let initial_type = initial.value.asset_type.clone();
        let initial_file_path = initial.value.file_path.clone();
        let initial_value = initial.value.clone();
        let pipeline_id = pipeline.id.clone();

        let pipeline_hash = self.pipeline_hash(pipeline)?;
        let options_value = self.options_value()?;
        let request_invalidation_hash = invalidation_hash(
            &self.request.invalidations,
            self.fs.as_ref(),
            &self.options.project_root,
            &options_value,
        );
        let initial_cache_key =
            self.cache_key(&[&initial_value], &request_invalidation_hash, &pipeline_hash)?;

        let can_read_cache = self.options.should_use_cache
            && self.request.code.is_none()
            && !self
                .request
                .invalidate_reason
                .contains(InvalidateReason::FILE_CREATE);

        let cached = if can_read_cache {
            self.read_from_cache(&initial_cache_key)
        } else {
            None
        };
        let from_cache = cached.is_some();
        let mut assets = match cached {
            Some(assets) => assets,
            None => self.run_pipeline(pipeline, initial)?,
        };

        for entry in pipeline.transformers.clone() {
            let dep = DevDepSpecifier::new(entry.name.clone(), entry.resolve_from.clone());
            self.add_dev_dependency(dep, Some(&entry))?;
        }

        if !from_cache && self.options.should_use_cache && self.request.code.is_none() {
            // The write key differs from the read key on purpose: it hashes
            // the invalidations the execution actually accumulated, not the
            // ones the request arrived with.
            let post_pipeline_hash = self.pipeline_hash(pipeline)?;
            let result_invalidation_hash = invalidation_hash(
                &self.invalidations.invalidations(),
                self.fs.as_ref(),
                &self.options.project_root,
                &options_value,
            );
            let result_cache_key = self.cache_key(
                &[&initial_value],
                &result_invalidation_hash,
                &post_pipeline_hash,
            )?;
            self.write_to_cache(&result_cache_key, &mut assets)?;
        }

        let mut final_assets = Vec::with_capacity(assets.len());
        for asset in assets {
            let next_pipeline = if asset.value.asset_type != initial_type {
                self.load_next_pipeline(
                    &initial_file_path,
                    &asset.value.asset_type,
                    asset.value.is_source,
                    &pipeline_id,
                )?
            } else {
                None
            };
            match next_pipeline {
                Some(mut next) => {
                    let mut chained = self.run_pipelines(&mut next, asset)?;
                    final_assets.append(&mut chained);
                }
                None => final_assets.push(asset),
            }
        }
        Ok(final_assets)
    }

    /// Resolve the pipeline a type-changed asset would continue in. Returns
    /// None when it is the same pipeline identity, which marks the asset as
    /// terminal and is what keeps chaining from looping.
    fn load_next_pipeline(
        &mut self,
        initial_file_path: &ProjectPath,
        new_type: &str,
        is_source: bool,
        current_pipeline_id: &str,
    ) -> Result<Option<Pipeline>, DiagnosticError> {
        let next_path = initial_file_path.with_type(new_type);
        let next = self.load_pipeline(&next_path, is_source, None)?;
        if next.id == current_pipeline_id {
            Ok(None)
        } else {
            Ok(Some(next))
        }
    }

    /// Drive every transformer of one pipeline over the asset sequence,
    /// then materialize dirty ASTs that are not deferred to packaging.
    fn run_pipeline(
        &mut self,
        pipeline: &mut Pipeline,
        initial: UncommittedAsset,
    ) -> Result<Vec<UncommittedAsset>, DiagnosticError> {
        if pipeline.transformers.is_empty() {
            return Ok(vec![initial]);
        }
        let initial_type = initial.value.asset_type.clone();
        let initial_file_path = initial.value.file_path.clone();
        let pipeline_id = pipeline.id.clone();

        let mut input_assets = vec![initial];
        let mut final_assets: Vec<UncommittedAsset> = Vec::new();

        let transformers = pipeline.transformers.clone();
        for entry in &transformers {
            let mut resulting_assets = Vec::new();
            for mut asset in std::mem::take(&mut input_assets) {
                // A type-changed asset with a valid follow-up pipeline is
                // chained by the caller, not fed to the remaining
                // transformers here.
                if asset.value.asset_type != initial_type {
                    let diverged = self.load_next_pipeline(
                        &initial_file_path,
                        &asset.value.asset_type,
                        asset.value.is_source,
                        &pipeline_id,
                    )?;
                    if diverged.is_some() {
                        final_assets.push(asset);
                        continue;
                    }
                }
                let absolute = asset.value.file_path.to_absolute(&self.options.project_root);
                let outputs = self
                    .run_transformer(pipeline, &mut asset, entry)
                    .map_err(|err| err.attributed_to(&entry.name, &absolute.to_string_lossy()))?;
                let children = self.normalize_outputs(asset, outputs, entry)?;
                resulting_assets.extend(children);
            }
            input_assets = resulting_assets;
        }

        final_assets.extend(input_assets);

        let generate = pipeline.generate.clone();
        let this: &Transformation = self;
        final_assets
            .par_iter_mut()
            .try_for_each(|asset| this.finalize_asset(asset, generate.as_ref()))?;

        Ok(final_assets)
    }

    /// One transformer call: AST reuse or materialization, optional parse,
    /// transform, and installing the new generate capability.
    fn run_transformer(
        &mut self,
        pipeline: &mut Pipeline,
        asset: &mut UncommittedAsset,
        entry: &TransformerEntry,
    ) -> Result<Vec<TransformerOutput>, DiagnosticError> {
        let logger = PluginLogger::new(&entry.name, self.logger.as_ref());
        let resolver = pipeline.resolver.clone();
        let tracker = self.invalidations.clone();
        let project_root = self.options.project_root.clone();
        let mut resolve = |from: &Path, specifier: &str| -> Result<PathBuf, DiagnosticError> {
            let result = resolver.resolve(specifier, from)?;
            for path in &result.invalidate_on_file_change {
                tracker.add(Invalidation::File {
                    path: ProjectPath::from_absolute(&project_root, path),
                });
            }
            for invalidation in result.invalidate_on_file_create {
                tracker.add_file_create(invalidation);
            }
            Ok(result.file_path)
        };

        if asset.is_ast_dirty && asset.ast.is_some() {
            let reusable = match (&entry.plugin.can_reuse_ast, &asset.ast) {
                (Some(can_reuse), Some(ast)) => can_reuse(ast, &self.options, &logger),
                _ => false,
            };
            if !reusable {
                let generate = pipeline.generate.clone().ok_or_else(|| {
                    DiagnosticError::new(
                        CORE_ORIGIN,
                        "Asset has an AST but no generate capability was installed on the pipeline",
                    )
                })?;
                if let Some(ast) = asset.ast.clone() {
                    let output =
                        generate.run(&asset.value, ast, &self.options, self.logger.as_ref())?;
                    asset.content = output.content;
                    asset.map_buffer = output.map;
                    asset.clear_ast();
                }
            }
        }

        if asset.ast.is_none() {
            if let Some(parse) = &entry.plugin.parse {
                let parsed = parse(ParseInput {
                    asset: MutableAsset::new(asset, &self.options.project_root),
                    config: self.configs.get(&entry.name),
                    options: &self.options,
                    resolve: &mut resolve,
                    logger: &logger,
                })?;
                if let Some(ast) = parsed {
                    asset.set_ast(ast, false);
                }
            }
        }

        let ast = asset.ast.clone();
        let outputs = (entry.plugin.transform)(TransformInput {
            asset: MutableAsset::new(asset, &self.options.project_root),
            ast,
            config: self.configs.get(&entry.name),
            options: &self.options,
            resolve: &mut resolve,
            logger: &logger,
        })?;

        pipeline.generate = Some(PipelineGenerate::new(entry.name.clone(), entry.plugin.clone()));
        Ok(outputs)
    }

    /// Turn a transformer's outputs into the next round of assets,
    /// stamping provenance on every newly created one.
    fn normalize_outputs(
        &self,
        asset: UncommittedAsset,
        outputs: Vec<TransformerOutput>,
        entry: &TransformerEntry,
    ) -> Result<Vec<UncommittedAsset>, DiagnosticError> {
        let parent_value = asset.value.clone();
        let parent_id_base = asset.id_base.clone();
        let mut slot = Some(asset);
        let mut children = Vec::new();
        for output in outputs {
            match output {
                TransformerOutput::Input => match slot.take() {
                    Some(parent) => children.push(parent),
                    None => {
                        return Err(DiagnosticError::new(
                            CORE_ORIGIN,
                            format!(
                                "Transformer {} returned the input asset more than once",
                                entry.name
                            ),
                        ))
                    }
                },
                TransformerOutput::New(created) => {
                    children.push(self.create_child(&parent_value, &parent_id_base, created, entry));
                }
            }
        }
        Ok(children)
    }

    fn create_child(
        &self,
        parent: &AssetValue,
        id_base: &str,
        created: CreatedAsset,
        entry: &TransformerEntry,
    ) -> UncommittedAsset {
        let env = created.env.unwrap_or_else(|| parent.env.clone());
        let ast_only = created.ast.is_some() && created.content.is_none();
        let content = created.content.unwrap_or_default();
        let value = AssetValue {
            id: String::new(),
            file_path: parent.file_path.clone(),
            asset_type: created.asset_type,
            env,
            content_hash: None,
            content_key: None,
            map_key: None,
            query: parent.query.clone(),
            is_source: parent.is_source,
            side_effects: parent.side_effects,
            is_inline: created.is_inline,
            is_isolated: created.is_isolated,
            pipeline: created.pipeline.or_else(|| parent.pipeline.clone()),
            unique_key: created.unique_key,
            stats: AssetStats::default(),
            symbols: created.symbols,
            dependencies: Vec::new(),
            meta: created.meta,
            plugin: Some(entry.name.clone()),
            config_path: self.selector.config_path(),
            config_key_path: entry.config_key_path.clone(),
        };
        let mut child = UncommittedAsset::new(
            value,
            id_base.to_string(),
            content,
            self.invalidations.clone(),
        );
        child.map_buffer = created.map;
        for descriptor in created.dependencies {
            let mut facade = MutableAsset::new(&mut child, &self.options.project_root);
            facade.add_dependency(descriptor);
        }
        if let Some(ast) = created.ast {
            child.set_ast(ast, ast_only);
        }
        child
    }

    /// Materialize a dirty AST into content unless generation is deferred
    /// to packaging: scope-hoisted JS and production CSS with symbols are
    /// regenerated there anyway.
    fn finalize_asset(
        &self,
        asset: &mut UncommittedAsset,
        generate: Option<&PipelineGenerate>,
    ) -> Result<(), DiagnosticError> {
        if asset.ast.is_none() || !asset.is_ast_dirty {
            return Ok(());
        }
        if asset.value.asset_type == "js" && asset.value.env.should_scope_hoist {
            return Ok(());
        }
        if asset.value.asset_type == "css"
            && asset.value.env.mode == BuildMode::Production
            && asset.value.symbols.is_some()
        {
            return Ok(());
        }
        let generate = generate.ok_or_else(|| {
            DiagnosticError::new(
                CORE_ORIGIN,
                "Asset has an AST but no generate capability was installed on the pipeline",
            )
        })?;
        if let Some(ast) = asset.ast.clone() {
            let absolute = asset.value.file_path.to_absolute(&self.options.project_root);
            let output = generate
                .run(&asset.value, ast, &self.options, self.logger.as_ref())
                .map_err(|err| {
                    err.attributed_to(&generate.plugin_name, &absolute.to_string_lossy())
                })?;
            asset.content = output.content;
            asset.map_buffer = output.map;
            asset.clear_ast();
            asset.value.stats.size = asset.content.len() as u64;
        }
        Ok(())
    }

    fn read_from_cache(&self, key: &str) -> Option<Vec<UncommittedAsset>> {
        let bytes = self.cache.get(key)?;
        let entry: CachedPipelineEntry = serde_json::from_slice(&bytes).ok()?;
        let mut assets = Vec::with_capacity(entry.assets.len());
        for record in entry.assets {
            let content = match record
                .value
                .content_key
                .as_ref()
                .and_then(|content_key| self.cache.get_blob(content_key))
            {
                Some(content) => content,
                None => return None,
            };
            let map = record
                .value
                .map_key
                .as_ref()
                .and_then(|map_key| self.cache.get_blob(map_key));
            assets.push(UncommittedAsset::from_cache(
                record.value,
                record.id_base,
                content,
                map,
                self.invalidations.clone(),
            ));
        }
        for invalidation in entry.invalidations {
            self.invalidations.add(invalidation);
        }
        for invalidation in entry.invalidate_on_file_create {
            self.invalidations.add_file_create(invalidation);
        }
        Some(assets)
    }

    fn write_to_cache(
        &self,
        key: &str,
        assets: &mut [UncommittedAsset],
    ) -> Result<(), DiagnosticError> {
        let mut records = Vec::with_capacity(assets.len());
        for asset in assets.iter_mut() {
            asset.commit(&self.options.project_root);
            let content_hash = asset.value.content_hash.clone().unwrap_or_default();
            let content_key = format!("content:{}:{}", asset.value.id, content_hash);
            self.cache.set_blob(&content_key, asset.content.clone());
            asset.value.content_key = Some(content_key);
            if let Some(map) = &asset.map_buffer {
                let map_key = format!("map:{}:{}", asset.value.id, content_hash);
                self.cache.set_blob(&map_key, map.clone());
                asset.value.map_key = Some(map_key);
            }
            records.push(CachedAssetRecord {
                value: asset.value.clone(),
                id_base: asset.id_base.clone(),
            });
        }
        let entry = CachedPipelineEntry {
            assets: records,
            invalidations: self.invalidations.invalidations(),
            invalidate_on_file_create: self.invalidations.file_creates(),
        };
        let bytes = serde_json::to_vec(&entry).map_err(|err| {
            DiagnosticError::new(
                CORE_ORIGIN,
                format!("Failed to serialize cache entry: {}", err),
            )
        })?;
        self.cache.set(key, bytes);
        Ok(())
    }
}
