// Pipelines
//
// A resolved, ordered transformer sequence plus the generate capability
// installed by the most recent transformer that produced an AST. The
// capability is an explicit optional field, updated after every
// transformer runs; calling it on an asset whose transformer cannot
// generate is a programmer error.

use crate::asset::{Ast, AssetValue};
use crate::diagnostics::{Diagnostic, DiagnosticError};
use crate::logging::{Logger, PluginLogger};
use crate::options::TransformOptions;
use crate::plugin::{GenerateInput, GeneratedOutput, Transformer, TransformerEntry};
use crate::resolver::PipelineResolver;
use std::sync::Arc;

/// Generate capability carried between transformer runs.
#[derive(Clone)]
pub struct PipelineGenerate {
    pub plugin_name: String,
    transformer: Arc<Transformer>,
}

impl PipelineGenerate {
    pub fn new(plugin_name: impl Into<String>, transformer: Arc<Transformer>) -> Self {
        PipelineGenerate {
            plugin_name: plugin_name.into(),
            transformer,
        }
    }

    pub fn run(
        &self,
        asset: &AssetValue,
        ast: Ast,
        options: &TransformOptions,
        logger: &dyn Logger,
    ) -> Result<GeneratedOutput, DiagnosticError> {
        let generate = self.transformer.generate.as_ref().ok_or_else(|| {
            DiagnosticError::from(Diagnostic::new(
                self.plugin_name.clone(),
                "Asset has an AST but no generate method is available on the transformer",
            ))
        })?;
        let plugin_logger = PluginLogger::new(&self.plugin_name, logger);
        generate(GenerateInput {
            asset,
            ast,
            options,
            logger: &plugin_logger,
        })
    }
}

/// A resolved pipeline. Identified by the `:`-joined transformer names;
/// chaining between pipelines compares these ids.
pub struct Pipeline {
    pub id: String,
    pub transformers: Vec<TransformerEntry>,
    pub generate: Option<PipelineGenerate>,
    pub resolver: Arc<dyn PipelineResolver>,
}

impl Pipeline {
    pub fn new(transformers: Vec<TransformerEntry>, resolver: Arc<dyn PipelineResolver>) -> Self {
        let id = transformers
            .iter()
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>()
            .join(":");
        Pipeline {
            id,
            transformers,
            generate: None,
            resolver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{noop_transformer, transformer_entry, NullResolver};

    mod pipeline_id_tests {
        use super::*;

        #[test]
        fn should_join_transformer_names() {
            let pipeline = Pipeline::new(
                vec![
                    transformer_entry("t-a", noop_transformer()),
                    transformer_entry("t-b", noop_transformer()),
                ],
                Arc::new(NullResolver),
            );
            assert_eq!(pipeline.id, "t-a:t-b");
        }

        #[test]
        fn should_produce_an_empty_id_for_an_empty_pipeline() {
            let pipeline = Pipeline::new(Vec::new(), Arc::new(NullResolver));
            assert_eq!(pipeline.id, "");
        }
    }

    mod generate_capability_tests {
        use super::*;
        use crate::asset::Ast;
        use crate::logging::NullLogger;

        #[test]
        fn should_fail_without_a_generate_hook() {
            let capability = PipelineGenerate::new("t-a", noop_transformer());
            let asset = crate::testing::asset_value("src/a.js", "js");
            let options = TransformOptions::new("/project");
            let result = capability.run(&asset, Ast::new(0u8), &options, &NullLogger);
            let err = result.unwrap_err();
            assert_eq!(err.diagnostic.origin, "t-a");
            assert!(err.diagnostic.message.contains("no generate method"));
        }
    }
}
