// Transformation Tests
//
// End-to-end scenarios driven through in-memory hosts, plus the
// determinism properties of the cache key and pipeline hash.

use super::*;
use crate::asset::Ast;
use crate::package_manager::PackageInvalidations;
use crate::plugin::{GeneratedOutput, Transformer};
use crate::testing::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct Harness {
    fs: Arc<MockFileSystem>,
    cache: Arc<MemoryCache>,
    package_manager: Arc<MockPackageManager>,
    selector: Arc<StaticSelector>,
    reporter: Arc<RecordingReporter>,
    build: Arc<BuildScope>,
    options: Arc<TransformOptions>,
}

impl Harness {
    fn new() -> Self {
        Harness {
            fs: Arc::new(MockFileSystem::new()),
            cache: Arc::new(MemoryCache::new()),
            package_manager: Arc::new(MockPackageManager::new()),
            selector: Arc::new(StaticSelector::new()),
            reporter: Arc::new(RecordingReporter::new()),
            build: Arc::new(BuildScope::new()),
            options: Arc::new(test_options("/project")),
        }
    }

    fn ctx(&self) -> TransformationContext {
        TransformationContext {
            options: self.options.clone(),
            selector: self.selector.clone(),
            fs: self.fs.clone(),
            cache: self.cache.clone(),
            package_manager: self.package_manager.clone(),
            reporter: self.reporter.clone(),
            logger: test_logger(),
            build: self.build.clone(),
        }
    }

    fn write(&self, path: &str, content: &[u8]) {
        self.fs
            .insert(PathBuf::from("/project").join(path), content.to_vec());
    }

    fn request(&self, path: &str) -> TransformationRequest {
        TransformationRequest::new(ProjectPath::new(path), Environment::default())
    }

    fn run(&self, request: TransformationRequest) -> Result<TransformationResult, DiagnosticError> {
        Transformation::new(request, self.ctx()).run()
    }
}

fn counting_noop(counter: Arc<AtomicUsize>) -> Arc<Transformer> {
    transformer()
        .transform(Box::new(move |_input| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![TransformerOutput::Input])
        }))
        .build()
}

fn set_type_transformer(new_type: &'static str, counter: Arc<AtomicUsize>) -> Arc<Transformer> {
    transformer()
        .transform(Box::new(move |mut input| {
            counter.fetch_add(1, Ordering::SeqCst);
            input.asset.set_type(new_type);
            Ok(vec![TransformerOutput::Input])
        }))
        .build()
}

/// Parses content into a string AST, re-marks it dirty in transform, and
/// can generate content back out of it.
fn ast_transformer() -> Arc<Transformer> {
    transformer()
        .parse(Box::new(|input| {
            Ok(Some(Ast::new(input.asset.content_string().into_owned())))
        }))
        .transform(Box::new(|mut input| {
            if let Some(ast) = input.ast.clone() {
                input.asset.set_ast(ast);
            }
            Ok(vec![TransformerOutput::Input])
        }))
        .generate(Box::new(|input| {
            let source = input
                .ast
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_default();
            Ok(GeneratedOutput {
                content: format!("generated:{}", source).into_bytes(),
                map: None,
            })
        }))
        .build()
}

mod scenario_tests {
    use super::*;

    #[test]
    fn should_run_an_identity_pipeline_and_hit_the_cache_on_the_second_run() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        let counter = Arc::new(AtomicUsize::new(0));
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", counting_noop(counter.clone()))]);

        let first = harness.run(harness.request("a.txt")).unwrap();
        assert_eq!(first.assets.len(), 1);
        assert_eq!(first.assets[0].value.asset_type, "txt");
        assert_eq!(
            first.assets[0].value.content_hash.as_deref(),
            Some(crate::hashing::hash_bytes(b"hi").as_str())
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // The upstream graph hands the recorded dev-dep hashes back on the
        // next run; that is what makes the initial cache key line up.
        let mut second_request = harness.request("a.txt");
        for dep in &first.dev_dep_requests {
            second_request
                .dev_deps
                .insert(format!("{}:{}", dep.specifier, dep.resolve_from), dep.hash.clone());
        }
        let second = harness.run(second_request).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(second.assets.len(), 1);
        assert_eq!(second.assets[0].value, first.assets[0].value);
        assert_eq!(second.assets[0].content, first.assets[0].content);
    }

    #[test]
    fn should_chain_pipelines_when_the_type_changes() {
        let harness = Harness::new();
        harness.write("x.ts", b"let x: number = 1");
        harness.write("tsconfig.json", b"{}");
        let ts_runs = Arc::new(AtomicUsize::new(0));
        let js_runs = Arc::new(AtomicUsize::new(0));

        let ts_to_js = {
            let counter = ts_runs.clone();
            transformer()
                .load_config(Box::new(|config, _options, _logger| {
                    config.add_included_file(ProjectPath::new("tsconfig.json"));
                    Ok(())
                }))
                .transform(Box::new(move |mut input| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    input.asset.set_type("js");
                    input.asset.set_content("let x = 1".as_bytes().to_vec());
                    Ok(vec![TransformerOutput::Input])
                }))
                .build()
        };
        harness
            .selector
            .add("ts", vec![transformer_entry("t-ts2js", ts_to_js)]);
        harness
            .selector
            .add("js", vec![transformer_entry("t-jsmin", counting_noop(js_runs.clone()))]);

        let result = harness.run(harness.request("x.ts")).unwrap();
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].value.asset_type, "js");
        assert_eq!(ts_runs.load(Ordering::SeqCst), 1);
        assert_eq!(js_runs.load(Ordering::SeqCst), 1);

        let config_request = result
            .config_requests
            .iter()
            .find(|request| request.plugin_name == "t-ts2js")
            .expect("config request for t-ts2js");
        assert_eq!(
            config_request.included_files,
            vec![ProjectPath::new("tsconfig.json")]
        );
    }

    #[test]
    fn should_bypass_the_cache_for_inline_code() {
        let harness = Harness::new();
        harness
            .selector
            .add("js", vec![transformer_entry("t-noop", noop_transformer())]);
        let mut request = harness.request("virtual.js");
        request.code = Some("console.log(1)".to_string());

        let result = harness.run(request).unwrap();
        assert_eq!(result.assets.len(), 1);
        assert_eq!(
            result.assets[0].id_base,
            crate::hashing::hash_bytes(b"console.log(1)")
        );
        assert_eq!(harness.cache.read_count(), 0);
        assert_eq!(harness.cache.value_count(), 0);
        assert!(!result.dev_dep_requests.is_empty());
    }

    #[test]
    fn should_short_circuit_request_supplied_dev_dep_hashes() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);
        let mut request = harness.request("a.txt");
        request
            .dev_deps
            .insert("t-noop:node_modules/t-noop".to_string(), "h".to_string());

        let result = harness.run(request).unwrap();
        assert_eq!(result.dev_dep_requests.len(), 1);
        let dep = &result.dev_dep_requests[0];
        assert_eq!(dep.specifier, "t-noop");
        assert_eq!(dep.resolve_from, ProjectPath::new("node_modules/t-noop"));
        assert_eq!(dep.hash, "h");
        assert!(dep.invalidate_on_file_change.is_empty());
        assert!(harness.package_manager.invalidation_queries().is_empty());
    }

    #[test]
    fn should_fail_with_a_diagnostic_for_an_unhashable_config_result() {
        #[derive(Debug)]
        struct Unhashable;
        impl crate::plugin_config::ConfigResult for Unhashable {
            fn canonical(&self) -> Result<String, crate::plugin_config::ConfigHashError> {
                Err(crate::plugin_config::ConfigHashError::new(
                    "value contains a cycle",
                ))
            }
        }

        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        let bad = transformer()
            .load_config(Box::new(|config, _options, _logger| {
                config.set_result(Unhashable);
                Ok(())
            }))
            .build();
        harness.selector.add("txt", vec![transformer_entry("t-bad", bad)]);

        let err = harness.run(harness.request("a.txt")).unwrap_err();
        assert_eq!(err.diagnostic.origin, "t-bad");
        assert!(err.diagnostic.message.contains("Config result is not hashable"));
    }

    #[test]
    fn should_defer_generation_for_scope_hoisted_js() {
        let harness = Harness::new();
        harness.write("a.js", b"source");
        harness
            .selector
            .add("js", vec![transformer_entry("t-ast", ast_transformer())]);
        let mut request = harness.request("a.js");
        request.env.should_scope_hoist = true;

        let result = harness.run(request).unwrap();
        let asset = &result.assets[0];
        assert!(asset.ast.is_some());
        assert!(asset.is_ast_dirty);
        assert_eq!(asset.content, b"source");
    }

    #[test]
    fn should_generate_content_when_scope_hoisting_is_off() {
        let harness = Harness::new();
        harness.write("a.js", b"source");
        harness
            .selector
            .add("js", vec![transformer_entry("t-ast", ast_transformer())]);

        let result = harness.run(harness.request("a.js")).unwrap();
        let asset = &result.assets[0];
        assert!(asset.ast.is_none());
        assert!(!asset.is_ast_dirty);
        assert_eq!(asset.content, b"generated:source");
    }

    #[test]
    fn should_defer_generation_for_production_css_with_symbols() {
        let harness = Harness::new();
        harness.write("a.css", b".x{}");
        let css = transformer()
            .parse(Box::new(|input| {
                Ok(Some(Ast::new(input.asset.content_string().into_owned())))
            }))
            .transform(Box::new(|mut input| {
                if let Some(ast) = input.ast.clone() {
                    input.asset.set_ast(ast);
                }
                let mut symbols = crate::asset::AssetSymbols::new();
                symbols.insert(
                    "x".to_string(),
                    crate::asset::AssetSymbol { local: "x".to_string() },
                );
                input.asset.set_symbols(symbols);
                Ok(vec![TransformerOutput::Input])
            }))
            .generate(Box::new(|_input| Ok(GeneratedOutput::default())))
            .build();
        harness.selector.add("css", vec![transformer_entry("t-css", css)]);
        let mut request = harness.request("a.css");
        request.env.mode = BuildMode::Production;

        let result = harness.run(request).unwrap();
        assert!(result.assets[0].is_ast_dirty);
        assert_eq!(result.assets[0].content, b".x{}");
    }
}

mod cache_key_tests {
    use super::*;

    fn transformation(harness: &Harness, request: TransformationRequest) -> Transformation {
        Transformation::new(request, harness.ctx())
    }

    #[test]
    fn should_be_deterministic_for_identical_inputs() {
        let harness = Harness::new();
        let t = transformation(&harness, harness.request("a.txt"));
        let mut value = asset_value("a.txt", "txt");
        value.content_hash = Some("abc".to_string());
        let first = t.cache_key(&[&value], "inv", "pipe").unwrap();
        let second = t.cache_key(&[&value], "inv", "pipe").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn should_ignore_query_entry_order() {
        let harness = Harness::new();
        let t = transformation(&harness, harness.request("a.txt"));
        let mut forward = asset_value("a.txt", "txt");
        forward.query.insert("a".into(), "1".into());
        forward.query.insert("b".into(), "2".into());
        let mut reversed = asset_value("a.txt", "txt");
        reversed.query.insert("b".into(), "2".into());
        reversed.query.insert("a".into(), "1".into());
        assert_eq!(
            t.cache_key(&[&forward], "inv", "pipe").unwrap(),
            t.cache_key(&[&reversed], "inv", "pipe").unwrap()
        );
    }

    #[test]
    fn should_change_with_every_declared_input() {
        let harness = Harness::new();
        let t = transformation(&harness, harness.request("a.txt"));
        let mut value = asset_value("a.txt", "txt");
        value.content_hash = Some("abc".to_string());
        let base = t.cache_key(&[&value], "inv", "pipe").unwrap();

        assert_ne!(t.cache_key(&[&value], "other", "pipe").unwrap(), base);
        assert_ne!(t.cache_key(&[&value], "inv", "other").unwrap(), base);

        let mut changed = value.clone();
        changed.content_hash = Some("def".to_string());
        assert_ne!(t.cache_key(&[&changed], "inv", "pipe").unwrap(), base);

        let mut production = transformation(&harness, harness.request("a.txt"));
        production.request.env.mode = BuildMode::Production;
        assert_ne!(production.cache_key(&[&value], "inv", "pipe").unwrap(), base);
    }
}

mod pipeline_hash_tests {
    use super::*;
    use crate::plugin_config::JsonConfigResult;
    use serde_json::json;

    fn hash_with_config(result: serde_json::Value) -> String {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        let plugin = transformer()
            .load_config(Box::new(move |config, _options, _logger| {
                config.set_result(JsonConfigResult(result.clone()));
                Ok(())
            }))
            .build();
        harness.selector.add("txt", vec![transformer_entry("t-cfg", plugin)]);
        let mut t = Transformation::new(harness.request("a.txt"), harness.ctx());
        let pipeline = t
            .load_pipeline(&ProjectPath::new("a.txt"), true, None)
            .unwrap();
        t.pipeline_hash(&pipeline).unwrap()
    }

    #[test]
    fn should_depend_on_the_config_result() {
        assert_ne!(hash_with_config(json!({"a": 1})), hash_with_config(json!({"a": 2})));
    }

    #[test]
    fn should_depend_on_transformer_names() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness
            .selector
            .add("txt", vec![transformer_entry("t-one", noop_transformer())]);
        let mut t = Transformation::new(harness.request("a.txt"), harness.ctx());
        let pipeline_one = t
            .load_pipeline(&ProjectPath::new("a.txt"), true, None)
            .unwrap();
        let hash_one = t.pipeline_hash(&pipeline_one).unwrap();

        harness
            .selector
            .add("txt", vec![transformer_entry("t-two", noop_transformer())]);
        let pipeline_two = t
            .load_pipeline(&ProjectPath::new("a.txt"), true, None)
            .unwrap();
        let hash_two = t.pipeline_hash(&pipeline_two).unwrap();
        assert_ne!(hash_one, hash_two);
    }

    #[test]
    fn should_prefer_request_supplied_dev_dep_hashes() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);

        let mut with_hash = harness.request("a.txt");
        with_hash
            .dev_deps
            .insert("t-noop:node_modules/t-noop".to_string(), "aaaa".to_string());
        let mut t1 = Transformation::new(with_hash, harness.ctx());
        let pipeline = t1
            .load_pipeline(&ProjectPath::new("a.txt"), true, None)
            .unwrap();
        let first = t1.pipeline_hash(&pipeline).unwrap();

        let mut with_other = harness.request("a.txt");
        with_other
            .dev_deps
            .insert("t-noop:node_modules/t-noop".to_string(), "bbbb".to_string());
        let mut t2 = Transformation::new(with_other, harness.ctx());
        let pipeline = t2
            .load_pipeline(&ProjectPath::new("a.txt"), true, None)
            .unwrap();
        let second = t2.pipeline_hash(&pipeline).unwrap();
        assert_ne!(first, second);
    }
}

mod dev_dep_tests {
    use super::*;

    #[test]
    fn should_record_full_invalidation_sets_with_a_matching_hash() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness.write("node_modules/t-noop/index.js", b"module.exports = 1");
        let mut invalidations = PackageInvalidations::default();
        invalidations
            .invalidate_on_file_change
            .insert(PathBuf::from("/project/node_modules/t-noop/index.js"));
        harness.package_manager.set_invalidations("t-noop", invalidations);
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);

        let result = harness.run(harness.request("a.txt")).unwrap();
        let dep = &result.dev_dep_requests[0];
        assert_eq!(
            dep.invalidate_on_file_change.iter().collect::<Vec<_>>(),
            vec![&ProjectPath::new("node_modules/t-noop/index.js")]
        );

        let expected = crate::invalidations::invalidation_hash(
            &[crate::invalidations::Invalidation::File {
                path: ProjectPath::new("node_modules/t-noop/index.js"),
            }],
            harness.fs.as_ref(),
            Path::new("/project"),
            &serde_json::to_value(harness.options.as_ref()).unwrap(),
        );
        assert_eq!(dep.hash, expected);
        assert_eq!(
            dep.additional_invalidations,
            vec![DevDepSpecifier::new("t-noop", ProjectPath::new("node_modules/t-noop"))]
        );
    }

    #[test]
    fn should_strip_dev_deps_already_known_to_the_build_scope() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness.write("node_modules/t-noop/index.js", b"one");
        let mut invalidations = PackageInvalidations::default();
        invalidations
            .invalidate_on_file_change
            .insert(PathBuf::from("/project/node_modules/t-noop/index.js"));
        harness.package_manager.set_invalidations("t-noop", invalidations);
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);

        let first = harness.run(harness.request("a.txt")).unwrap();
        assert!(!first.dev_dep_requests[0].invalidate_on_file_change.is_empty());

        let second = harness.run(harness.request("a.txt")).unwrap();
        assert!(second.dev_dep_requests[0].invalidate_on_file_change.is_empty());
        assert_eq!(second.dev_dep_requests[0].hash, first.dev_dep_requests[0].hash);
    }

    #[test]
    fn should_send_the_full_record_again_when_the_hash_changes() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness.write("node_modules/t-noop/index.js", b"one");
        let mut invalidations = PackageInvalidations::default();
        invalidations
            .invalidate_on_file_change
            .insert(PathBuf::from("/project/node_modules/t-noop/index.js"));
        harness.package_manager.set_invalidations("t-noop", invalidations);
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);

        let first = harness.run(harness.request("a.txt")).unwrap();
        harness.write("node_modules/t-noop/index.js", b"two");
        let second = harness.run(harness.request("a.txt")).unwrap();
        assert_ne!(second.dev_dep_requests[0].hash, first.dev_dep_requests[0].hash);
        assert!(!second.dev_dep_requests[0].invalidate_on_file_change.is_empty());

        let third = harness.run(harness.request("a.txt")).unwrap();
        assert!(third.dev_dep_requests[0].invalidate_on_file_change.is_empty());
    }
}

mod chaining_tests {
    use super::*;

    #[test]
    fn should_not_recurse_when_the_next_pipeline_has_the_same_identity() {
        let harness = Harness::new();
        harness.write("x.ts", b"x");
        let runs = Arc::new(AtomicUsize::new(0));
        let plugin = set_type_transformer("js", runs.clone());
        harness
            .selector
            .add("ts", vec![transformer_entry("t-x", plugin.clone())]);
        harness.selector.add("js", vec![transformer_entry("t-x", plugin)]);

        let result = harness.run(harness.request("x.ts")).unwrap();
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].value.asset_type, "js");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_set_aside_type_changed_assets_within_a_pipeline() {
        let harness = Harness::new();
        harness.write("x.ts", b"x");
        let first_runs = Arc::new(AtomicUsize::new(0));
        let second_runs = Arc::new(AtomicUsize::new(0));
        harness.selector.add(
            "ts",
            vec![
                transformer_entry("t-change", set_type_transformer("js", first_runs.clone())),
                transformer_entry("t-after", counting_noop(second_runs.clone())),
            ],
        );
        harness
            .selector
            .add("js", vec![transformer_entry("t-js", noop_transformer())]);

        let result = harness.run(harness.request("x.ts")).unwrap();
        // The second ts transformer never sees the asset once its type
        // diverged; the js pipeline picks it up instead.
        assert_eq!(first_runs.load(Ordering::SeqCst), 1);
        assert_eq!(second_runs.load(Ordering::SeqCst), 0);
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].value.asset_type, "js");
    }
}

mod cache_gate_tests {
    use super::*;

    fn cached_harness() -> Harness {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);
        harness
    }

    #[test]
    fn should_not_read_when_caching_is_disabled() {
        let mut harness = cached_harness();
        let mut options = test_options("/project");
        options.should_use_cache = false;
        harness.options = Arc::new(options);

        harness.run(harness.request("a.txt")).unwrap();
        assert_eq!(harness.cache.read_count(), 0);
        assert_eq!(harness.cache.value_count(), 0);
    }

    #[test]
    fn should_not_read_when_the_request_was_invalidated_by_a_file_create() {
        let harness = cached_harness();
        let mut request = harness.request("a.txt");
        request.invalidate_reason = InvalidateReason::FILE_CREATE;

        harness.run(request).unwrap();
        assert_eq!(harness.cache.read_count(), 0);
        // Fresh results still replace whatever was cached.
        assert_eq!(harness.cache.value_count(), 1);
    }
}

mod driver_tests {
    use super::*;
    use crate::resolver::ResolverResult;

    #[test]
    fn should_report_build_progress_with_the_absolute_path() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);
        harness.run(harness.request("a.txt")).unwrap();

        let events = harness.reporter.events();
        assert_eq!(
            events[0],
            ReporterEvent::BuildProgress {
                phase: BuildPhase::Transforming,
                file_path: PathBuf::from("/project/a.txt"),
            }
        );
    }

    #[test]
    fn should_return_the_asset_unchanged_for_an_empty_pipeline() {
        let harness = Harness::new();
        harness.write("a.bin", b"\x00\x01");
        let result = harness.run(harness.request("a.bin")).unwrap();
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.assets[0].content, b"\x00\x01");
        assert_eq!(result.assets[0].value.asset_type, "bin");
    }

    #[test]
    fn should_drop_assets_when_a_transformer_returns_nothing() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        let dropper = transformer().transform(Box::new(|_input| Ok(vec![]))).build();
        harness.selector.add("txt", vec![transformer_entry("t-drop", dropper)]);

        let result = harness.run(harness.request("a.txt")).unwrap();
        assert!(result.assets.is_empty());
    }

    #[test]
    fn should_wrap_transformer_failures_with_origin_and_path() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        let failing = transformer()
            .transform(Box::new(|_input| {
                Err(DiagnosticError::new("t-fail", "kaboom"))
            }))
            .build();
        harness.selector.add("txt", vec![transformer_entry("t-fail", failing)]);

        let err = harness.run(harness.request("a.txt")).unwrap_err();
        assert_eq!(err.diagnostic.origin, "t-fail");
        assert_eq!(err.diagnostic.message, "kaboom");
        assert_eq!(err.diagnostic.file_path.as_deref(), Some("/project/a.txt"));
    }

    #[test]
    fn should_invalidate_plugins_once_per_build() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        harness
            .selector
            .add("txt", vec![transformer_entry("t-noop", noop_transformer())]);
        let mut request = harness.request("a.txt");
        request
            .invalidate_dev_deps
            .push(DevDepSpecifier::new("t-noop", ProjectPath::new("node_modules/t-noop")));
        harness.run(request.clone()).unwrap();
        harness.run(request).unwrap();

        assert_eq!(harness.selector.invalidated(), vec!["t-noop".to_string()]);
        assert_eq!(harness.package_manager.invalidate_calls(), vec!["t-noop".to_string()]);
    }

    #[test]
    fn should_load_an_existing_source_map_next_to_the_asset() {
        let harness = Harness::new();
        harness.write("a.js", b"x;\n//# sourceMappingURL=a.js.map");
        harness.write("a.js.map", b"{\"version\":3}");
        harness
            .selector
            .add("js", vec![transformer_entry("t-noop", noop_transformer())]);

        let result = harness.run(harness.request("a.js")).unwrap();
        assert_eq!(result.assets[0].map_buffer.as_deref(), Some(b"{\"version\":3}".as_ref()));
    }

    #[test]
    fn should_swallow_source_map_load_failures() {
        let harness = Harness::new();
        harness.write("a.js", b"x;\n//# sourceMappingURL=missing.map");
        harness
            .selector
            .add("js", vec![transformer_entry("t-noop", noop_transformer())]);

        let result = harness.run(harness.request("a.js")).unwrap();
        assert!(result.assets[0].map_buffer.is_none());
    }

    #[test]
    fn should_deduplicate_resolver_invalidations() {
        let mut harness = Harness::new();
        harness.write("a.txt", b"hi");
        let resolver = Arc::new(MockResolver::new());
        resolver.set(
            "./dep",
            ResolverResult {
                file_path: PathBuf::from("/project/dep.txt"),
                invalidate_on_file_change: vec![PathBuf::from("/project/dep.txt")],
                invalidate_on_file_create: vec![FileCreateInvalidation::Glob {
                    pattern: "dep.*".to_string(),
                }],
            },
        );
        harness.selector = Arc::new(
            StaticSelector::new().with_resolver(resolver),
        );
        let resolving = transformer()
            .transform(Box::new(|mut input| {
                let from = input.asset.file_path();
                (input.resolve)(&from, "./dep")?;
                (input.resolve)(&from, "./dep")?;
                Ok(vec![TransformerOutput::Input])
            }))
            .build();
        harness
            .selector
            .add("txt", vec![transformer_entry("t-resolve", resolving)]);

        let result = harness.run(harness.request("a.txt")).unwrap();
        assert_eq!(
            result.invalidations,
            vec![Invalidation::File { path: ProjectPath::new("dep.txt") }]
        );
        assert_eq!(result.invalidate_on_file_create.len(), 1);
    }

    #[test]
    fn should_materialize_the_ast_for_a_transformer_that_cannot_reuse_it() {
        let harness = Harness::new();
        harness.write("a.js", b"source");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let witness = {
            let seen = seen.clone();
            transformer()
                .transform(Box::new(move |input| {
                    seen.lock()
                        .unwrap()
                        .push(input.asset.content_string().into_owned());
                    Ok(vec![TransformerOutput::Input])
                }))
                .build()
        };
        harness.selector.add(
            "js",
            vec![
                transformer_entry("t-ast", ast_transformer()),
                transformer_entry("t-witness", witness),
            ],
        );

        harness.run(harness.request("a.js")).unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["generated:source"]);
    }

    #[test]
    fn should_hand_the_ast_through_when_the_next_transformer_can_reuse_it() {
        let harness = Harness::new();
        harness.write("a.js", b"source");
        let saw_ast = Arc::new(AtomicUsize::new(0));
        let reusing = {
            let saw_ast = saw_ast.clone();
            transformer()
                .can_reuse_ast(Box::new(|_ast, _options, _logger| true))
                .transform(Box::new(move |input| {
                    if input.ast.is_some() {
                        saw_ast.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(vec![TransformerOutput::Input])
                }))
                .generate(Box::new(|input| {
                    let source = input
                        .ast
                        .downcast_ref::<String>()
                        .cloned()
                        .unwrap_or_default();
                    Ok(GeneratedOutput {
                        content: format!("generated:{}", source).into_bytes(),
                        map: None,
                    })
                }))
                .build()
        };
        harness.selector.add(
            "js",
            vec![
                transformer_entry("t-ast", ast_transformer()),
                transformer_entry("t-reuse", reusing),
            ],
        );

        harness.run(harness.request("a.js")).unwrap();
        assert_eq!(saw_ast.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_create_child_assets_with_provenance() {
        let harness = Harness::new();
        harness.write("a.txt", b"hi");
        let splitter = transformer()
            .transform(Box::new(|input| {
                Ok(vec![
                    TransformerOutput::Input,
                    TransformerOutput::New(CreatedAsset {
                        asset_type: "txt".to_string(),
                        content: Some(input.asset.content_bytes().to_vec()),
                        unique_key: Some("copy".to_string()),
                        ..CreatedAsset::default()
                    }),
                ])
            }))
            .build();
        harness.selector.add("txt", vec![transformer_entry("t-split", splitter)]);

        let result = harness.run(harness.request("a.txt")).unwrap();
        assert_eq!(result.assets.len(), 2);
        let child = &result.assets[1];
        assert_eq!(child.value.plugin.as_deref(), Some("t-split"));
        assert_eq!(child.value.unique_key.as_deref(), Some("copy"));
        assert_eq!(
            child.value.config_path,
            Some(ProjectPath::new("quarry.config.json"))
        );
        assert_ne!(child.value.id, result.assets[0].value.id);
    }
}
