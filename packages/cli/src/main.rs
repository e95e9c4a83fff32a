// Quarry CLI
//
// Runs a single transformation over one file and prints the produced
// assets and invalidation records. Useful for trying out pipeline maps
// and inspecting what the core would hand the build graph.

mod hosts;
mod selector;
mod transformers;

use anyhow::Context as _;
use clap::{Arg, ArgAction, Command};
use hosts::{ConsoleReporter, DirCache, LocalPackageManager, RelativeResolver};
use quarry_core::dev_deps::BuildScope;
use quarry_core::environment::{BuildMode, Environment};
use quarry_core::file_system::OsFileSystem;
use quarry_core::logging::{ConsoleLogger, LogLevel};
use quarry_core::options::TransformOptions;
use quarry_core::paths::ProjectPath;
use quarry_core::request::TransformationRequest;
use quarry_core::transformation::{Transformation, TransformationContext};
use selector::{MapSelector, PipelineMap};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {:#}", err);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let matches = Command::new("quarry")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Quarry transformation core")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .required(true)
                .help("File to transform, relative to the project root"),
        )
        .arg(
            Arg::new("project-root")
                .long("project-root")
                .value_name("PATH")
                .default_value(".")
                .help("Project root directory"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Pipeline map (JSON); defaults to the built-in map"),
        )
        .arg(
            Arg::new("pipeline")
                .long("pipeline")
                .value_name("NAME")
                .help("Named pipeline to use instead of the type default"),
        )
        .arg(
            Arg::new("production")
                .long("production")
                .action(ArgAction::SetTrue)
                .help("Transform in production mode"),
        )
        .arg(
            Arg::new("scope-hoist")
                .long("scope-hoist")
                .action(ArgAction::SetTrue)
                .help("Target a scope-hoisting build"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .action(ArgAction::SetTrue)
                .help("Disable the transformation cache"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Verbose logging"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the full result as JSON"),
        )
        .get_matches();

    let project_root = PathBuf::from(matches.get_one::<String>("project-root").expect("default"));
    let project_root = std::fs::canonicalize(&project_root)
        .with_context(|| format!("project root {} not found", project_root.display()))?;

    let (pipeline_map, config_path) = match matches.get_one::<String>("config") {
        Some(config) => {
            let config = PathBuf::from(config);
            let map = PipelineMap::load(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            (map, ProjectPath::from_absolute(&project_root, &config))
        }
        None => (PipelineMap::default_map(), ProjectPath::new("<built-in>")),
    };

    let log_level = if matches.get_flag("verbose") {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let mut options = TransformOptions::new(project_root.clone());
    options.should_use_cache = !matches.get_flag("no-cache");
    options.log_level = log_level;

    let ctx = TransformationContext {
        options: Arc::new(options),
        selector: Arc::new(MapSelector::new(
            pipeline_map,
            config_path,
            Arc::new(RelativeResolver),
        )),
        fs: Arc::new(OsFileSystem::new()),
        cache: Arc::new(DirCache::new(project_root.join(".quarry-cache"))),
        package_manager: Arc::new(LocalPackageManager::new(project_root.clone())),
        reporter: Arc::new(ConsoleReporter),
        logger: Arc::new(ConsoleLogger::new(log_level)),
        build: Arc::new(BuildScope::new()),
    };

    let file = matches.get_one::<String>("file").expect("required");
    let mut env = Environment::default();
    if matches.get_flag("production") {
        env.mode = BuildMode::Production;
    }
    env.should_scope_hoist = matches.get_flag("scope-hoist");

    let mut request = TransformationRequest::new(ProjectPath::new(file.as_str()), env);
    request.pipeline = matches.get_one::<String>("pipeline").cloned();

    let result = Transformation::new(request, ctx).run()?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{} asset(s):", result.assets.len());
    for asset in &result.assets {
        println!(
            "  {} [{}] {} bytes (hash {})",
            asset.value.file_path,
            asset.value.asset_type,
            asset.value.stats.size,
            asset
                .value
                .content_hash
                .as_deref()
                .map(|hash| &hash[..12])
                .unwrap_or("-"),
        );
        for dependency in &asset.value.dependencies {
            println!("    -> {}", dependency.specifier);
        }
    }
    println!(
        "{} invalidation(s), {} file-create pattern(s), {} config request(s), {} dev dep(s)",
        result.invalidations.len(),
        result.invalidate_on_file_create.len(),
        result.config_requests.len(),
        result.dev_dep_requests.len(),
    );
    Ok(())
}
