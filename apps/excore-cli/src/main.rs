//! The `excore` workspace CLI.
//!
//! Grounded on `apps/hyperspot-server/src/main.rs`'s shape (a clap-derive
//! `Cli`/`Commands` pair, layered workspace-descriptor loading before any
//! subcommand runs, `tracing` for operator-facing output) adapted to the
//! subcommand surface named in `spec.md` §6: `init`, `update`,
//! `auto-register [target]`, `primary-fields`, `registries`,
//! `generate-registries [entry]`, `config-extension`, `generate-typehints`,
//! `quote`, `cache-list`, `cache-dir`, `clear-cache`, `clear-all-cache`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use excore_bootstrap::config::WorkspaceDescriptor;
use excore_core::{RegistryPool, Value};

/// excore workspace CLI
#[derive(Parser)]
#[command(name = "excore")]
#[command(about = "Manage an excore workspace: registries, cache, and schema tooling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the workspace descriptor (defaults to the nearest `.excore.toml`)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default `.excore.toml` in the current directory
    Init {
        /// Overwrite an existing descriptor
        #[arg(long)]
        force: bool,
    },
    /// Re-read the descriptor and rewrite it with normalized paths
    Update,
    /// Run every `#[excore::register]` registrator and dump the pool to the registry cache
    AutoRegister {
        /// Only dump the named registry instead of the whole pool
        target: Option<String>,
    },
    /// List the descriptor's primary fields
    PrimaryFields,
    /// List the descriptor's registries and their parsed declarations
    Registries,
    /// Print a starter TOML stanza referencing every target in a registry
    GenerateRegistries {
        /// Registry name; defaults to the first primary registry
        entry: Option<String>,
    },
    /// Print the set of config file extensions excore will read
    ConfigExtension,
    /// Emit a type-hint stub for a registry's targets
    GenerateTypehints {
        entry: String,
        #[arg(long)]
        class_name: Option<String>,
        #[arg(long)]
        info_class_name: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Parse and pretty-print a TOML config, optionally with `--set` overrides
    Quote {
        path: PathBuf,
        /// `key=value` overrides applied to the parsed literal value, repeatable
        #[arg(long = "override", value_name = "key=value")]
        overrides: Vec<String>,
    },
    /// List files in the registry cache directory
    CacheList,
    /// Print the resolved cache directory
    CacheDir,
    /// Remove the current workspace's registry cache file
    ClearCache,
    /// Remove the entire cache directory
    ClearAllCache,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "excore command failed");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;

    match cli.command {
        Commands::Init { force } => cmd_init(&cwd, force),
        Commands::Update => cmd_update(&cwd, cli.config.as_deref()),
        Commands::AutoRegister { target } => cmd_auto_register(&cwd, cli.config.as_deref(), target.as_deref()),
        Commands::PrimaryFields => cmd_primary_fields(&cwd, cli.config.as_deref()),
        Commands::Registries => cmd_registries(&cwd, cli.config.as_deref()),
        Commands::GenerateRegistries { entry } => cmd_generate_registries(&cwd, cli.config.as_deref(), entry.as_deref()),
        Commands::ConfigExtension => cmd_config_extension(),
        Commands::GenerateTypehints { entry, class_name, info_class_name, config } => {
            cmd_generate_typehints(&entry, class_name.as_deref(), info_class_name.as_deref(), config.as_deref())
        }
        Commands::Quote { path, overrides } => cmd_quote(&path, &overrides),
        Commands::CacheList => cmd_cache_list(&cwd, cli.config.as_deref()),
        Commands::CacheDir => cmd_cache_dir(&cwd, cli.config.as_deref()),
        Commands::ClearCache => cmd_clear_cache(&cwd, cli.config.as_deref()),
        Commands::ClearAllCache => cmd_clear_all_cache(&cwd, cli.config.as_deref()),
    }
}

fn load_descriptor(cwd: &Path, explicit: Option<&Path>) -> Result<WorkspaceDescriptor> {
    match explicit {
        Some(path) => WorkspaceDescriptor::load(path),
        None => WorkspaceDescriptor::load_or_default(cwd),
    }
}

fn cmd_init(cwd: &Path, force: bool) -> Result<()> {
    let path = cwd.join(excore_bootstrap::config::DESCRIPTOR_FILE_NAME);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    let descriptor = WorkspaceDescriptor::default();
    std::fs::write(&path, descriptor.to_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_update(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    let path = explicit
        .map(|p| p.to_path_buf())
        .or_else(|| WorkspaceDescriptor::find_descriptor(cwd))
        .unwrap_or_else(|| cwd.join(excore_bootstrap::config::DESCRIPTOR_FILE_NAME));
    std::fs::write(&path, descriptor.to_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("updated {}", path.display());
    Ok(())
}

fn cmd_auto_register(cwd: &Path, explicit: Option<&Path>, target: Option<&str>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    RegistryPool::bootstrap();
    let pool = RegistryPool::global();

    let cache_path = descriptor.registry_cache_path();
    pool.dump(&cache_path)
        .with_context(|| format!("failed to write registry cache to {}", cache_path.display()))?;

    match target {
        Some(name) => {
            let registry = pool
                .get(name)
                .with_context(|| format!("no registry named `{name}` in the pool"))?;
            println!("{}", registry.table());
        }
        None => println!("{}", pool.table()),
    }
    println!("registry cache written to {}", cache_path.display());
    Ok(())
}

fn cmd_primary_fields(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    for field in &descriptor.primary_fields {
        println!("{field}");
    }
    Ok(())
}

fn cmd_registries(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    for decl in descriptor.registry_decls() {
        let marker = if decl.primary { "*" } else { " " };
        if decl.children.is_empty() {
            println!("{marker}{}", decl.name);
        } else {
            println!("{marker}{}: {}", decl.name, decl.children.join(", "));
        }
    }
    Ok(())
}

fn cmd_generate_registries(cwd: &Path, explicit: Option<&Path>, entry: Option<&str>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    let name = entry
        .map(|s| s.to_string())
        .or_else(|| descriptor.registry_decls().into_iter().find(|d| d.primary).map(|d| d.name))
        .context("no registry name given and no primary registry declared")?;

    RegistryPool::bootstrap();
    let pool = RegistryPool::global();
    let registry = pool
        .get(&name)
        .with_context(|| format!("no registry named `{name}` in the pool"))?;

    println!("[{name}]");
    for target_name in registry.names() {
        println!("[{name}.{target_name}]");
    }
    Ok(())
}

fn cmd_config_extension() -> Result<()> {
    println!("toml");
    Ok(())
}

/// Emits a minimal type-hint stub naming every target's required
/// parameters. Schema-generation proper (spec §9: "best-effort,
/// documented-minimal") is out of scope; this gives callers something
/// machine-readable rather than nothing.
fn cmd_generate_typehints(
    entry: &str,
    class_name: Option<&str>,
    info_class_name: Option<&str>,
    _config: Option<&Path>,
) -> Result<()> {
    RegistryPool::bootstrap();
    let pool = RegistryPool::global();
    let registry = pool
        .get(entry)
        .with_context(|| format!("no registry named `{entry}` in the pool"))?;

    let class_name = class_name.unwrap_or(entry);
    let info_class_name = info_class_name.map(|s| s.to_string()).unwrap_or_else(|| format!("{class_name}Info"));

    println!("# auto-generated by `excore generate-typehints {entry}` — do not edit by hand");
    println!("class {info_class_name}:");
    let mut names = registry.names();
    names.sort();
    for name in &names {
        println!("    {name}: dict  # required params documented via Factory::required_params");
    }
    println!();
    println!("class {class_name}:");
    for name in &names {
        println!("    {name}: \"{info_class_name}\"");
    }
    Ok(())
}

fn cmd_quote(path: &Path, overrides: &[String]) -> Result<()> {
    let mut raw = excore_core::config_dict::ConfigDict::load_toml_file_with_bases(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    for o in overrides {
        let (key, val) = o
            .split_once('=')
            .with_context(|| format!("--override must be key=value, got `{o}`"))?;
        raw.insert(key.to_string(), excore_core::value::parse_literal(val));
    }

    let json = value_map_to_json(&raw);
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn value_map_to_json(map: &std::collections::BTreeMap<String, Value>) -> serde_json::Value {
    serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect())
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => value_map_to_json(map),
        Value::Node(_) | Value::Wrapper(_) => serde_json::Value::String("<unresolved>".to_string()),
    }
}

fn cmd_cache_list(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    let dir = Path::new(&descriptor.cache_dir);
    if !dir.is_dir() {
        println!("(cache directory does not exist yet: {})", dir.display());
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        println!("{}", entry.path().display());
    }
    Ok(())
}

fn cmd_cache_dir(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    println!("{}", descriptor.cache_dir);
    Ok(())
}

fn cmd_clear_cache(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    let path = descriptor.registry_cache_path();
    if path.exists() {
        std::fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        println!("removed {}", path.display());
    } else {
        println!("no cache file at {}", path.display());
    }
    Ok(())
}

fn cmd_clear_all_cache(cwd: &Path, explicit: Option<&Path>) -> Result<()> {
    let descriptor = load_descriptor(cwd, explicit)?;
    let dir = Path::new(&descriptor.cache_dir);
    if dir.is_dir() {
        std::fs::remove_dir_all(dir).with_context(|| format!("failed to remove {}", dir.display()))?;
        println!("removed {}", dir.display());
    } else {
        println!("no cache directory at {}", dir.display());
    }
    Ok(())
}
