// Transformer Plugin Contract
//
// A transformer is a record of optional capability handles; the core calls
// whatever is present and never otherwise inspects the plugin. The pipeline
// selection trait stands in for the external configuration that decides
// which transformers apply to a path.

use crate::asset::{Ast, AssetSymbols, AssetValue, DependencyDescriptor, MutableAsset};
use crate::diagnostics::DiagnosticError;
use crate::environment::Environment;
use crate::logging::PluginLogger;
use crate::options::TransformOptions;
use crate::paths::ProjectPath;
use crate::plugin_config::PluginConfig;
use crate::resolver::PipelineResolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolve callback handed to `parse` and `transform`: `(from, specifier)`
/// to an absolute path, recording invalidations as a side effect.
pub type ResolveFn<'a> = &'a mut dyn FnMut(&Path, &str) -> Result<PathBuf, DiagnosticError>;

pub struct ParseInput<'a> {
    pub asset: MutableAsset<'a>,
    pub config: Option<&'a PluginConfig>,
    pub options: &'a TransformOptions,
    pub resolve: ResolveFn<'a>,
    pub logger: &'a PluginLogger<'a>,
}

pub struct TransformInput<'a> {
    pub asset: MutableAsset<'a>,
    /// The current AST, shared with the asset; mutate via `asset.set_ast`.
    pub ast: Option<Ast>,
    pub config: Option<&'a PluginConfig>,
    pub options: &'a TransformOptions,
    pub resolve: ResolveFn<'a>,
    pub logger: &'a PluginLogger<'a>,
}

pub struct GenerateInput<'a> {
    pub asset: &'a AssetValue,
    pub ast: Ast,
    pub options: &'a TransformOptions,
    pub logger: &'a PluginLogger<'a>,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedOutput {
    pub content: Vec<u8>,
    pub map: Option<Vec<u8>>,
}

/// Description of an asset a transformer emits alongside (or instead of)
/// the one it was given.
#[derive(Default)]
pub struct CreatedAsset {
    pub asset_type: String,
    /// Omitted when the asset is represented by its AST until generation.
    pub content: Option<Vec<u8>>,
    pub map: Option<Vec<u8>>,
    pub ast: Option<Ast>,
    pub dependencies: Vec<DependencyDescriptor>,
    pub unique_key: Option<String>,
    pub is_inline: bool,
    pub is_isolated: bool,
    pub pipeline: Option<String>,
    pub symbols: Option<AssetSymbols>,
    pub meta: serde_json::Map<String, serde_json::Value>,
    /// Defaults to the parent environment.
    pub env: Option<Environment>,
}

/// One item of a transformer's output.
pub enum TransformerOutput {
    /// The input asset, as mutated through the facade.
    Input,
    /// A newly created asset.
    New(CreatedAsset),
}

pub type LoadConfigFn = Box<
    dyn Fn(&mut PluginConfig, &TransformOptions, &PluginLogger) -> Result<(), DiagnosticError>
        + Send
        + Sync,
>;
pub type CanReuseAstFn =
    Box<dyn Fn(&Ast, &TransformOptions, &PluginLogger) -> bool + Send + Sync>;
pub type ParseFn =
    Box<dyn Fn(ParseInput<'_>) -> Result<Option<Ast>, DiagnosticError> + Send + Sync>;
pub type TransformFn =
    Box<dyn Fn(TransformInput<'_>) -> Result<Vec<TransformerOutput>, DiagnosticError> + Send + Sync>;
pub type GenerateFn =
    Box<dyn Fn(GenerateInput<'_>) -> Result<GeneratedOutput, DiagnosticError> + Send + Sync>;

/// A transformer plugin. Only `transform` is mandatory; the rest are
/// optional capabilities.
pub struct Transformer {
    pub load_config: Option<LoadConfigFn>,
    pub can_reuse_ast: Option<CanReuseAstFn>,
    pub parse: Option<ParseFn>,
    pub transform: TransformFn,
    pub generate: Option<GenerateFn>,
}

impl Transformer {
    /// A transformer with only a transform hook.
    pub fn from_transform(transform: TransformFn) -> Self {
        Transformer {
            load_config: None,
            can_reuse_ast: None,
            parse: None,
            transform,
            generate: None,
        }
    }
}

/// One configured transformer in a pipeline, as the external configuration
/// reports it.
#[derive(Clone)]
pub struct TransformerEntry {
    pub name: String,
    /// Project-relative location the plugin package resolves from.
    pub resolve_from: ProjectPath,
    pub plugin: Arc<Transformer>,
    /// Position of this entry inside the configuration file.
    pub config_key_path: Option<String>,
}

/// The external configuration that selects transformers for a path. Out of
/// scope for the core itself; this is its contract.
pub trait PipelineSelector: Send + Sync {
    /// Ordered transformers for `(path, pipeline-name, is_source)`.
    fn transformers_for(
        &self,
        path: &ProjectPath,
        pipeline: Option<&str>,
        is_source: bool,
    ) -> Result<Vec<TransformerEntry>, DiagnosticError>;

    /// Drop any cached plugin resolution for a specifier.
    fn invalidate_plugin(&self, specifier: &str);

    /// Resolver handle scoped to pipelines this selector produces.
    fn resolver(&self) -> Arc<dyn PipelineResolver>;

    /// Path of the configuration file itself, recorded on produced assets.
    fn config_path(&self) -> Option<ProjectPath> {
        None
    }
}
