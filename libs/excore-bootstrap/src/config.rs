//! The workspace descriptor (`.excore.toml`) — the single piece of runtime
//! input `excore-core` needs besides the TOML config itself (spec.md §6).
//!
//! Grounded on the teacher's `AppConfig`: a strongly-typed struct loaded
//! through a layered `figment::Figment` (defaults → file → env), with
//! `home_dir`-style path normalization. The teacher's DB/tracing/per-module
//! config bag has no counterpart here — the workspace descriptor's
//! "per-module bag" analogue is the `props` map (spec.md §6:
//! `props: map<string,any>`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::paths::home_dir::resolve_home_dir;

const DEFAULT_SUBDIR: &str = ".excore";
pub const DESCRIPTOR_FILE_NAME: &str = ".excore.toml";

/// A `registries` entry: `Name` or `*Name: child1, child2, …` (spec.md §6).
/// A leading `*` marks the registry as primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDecl {
    pub name: String,
    pub primary: bool,
    pub children: Vec<String>,
}

impl RegistryDecl {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (name_part, children_part) = match raw.split_once(':') {
            Some((n, c)) => (n, Some(c)),
            None => (raw, None),
        };
        let name_part = name_part.trim();
        let primary = name_part.starts_with('*');
        let name = name_part.trim_start_matches('*').trim().to_string();
        let children = children_part
            .map(|c| {
                c.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self { name, primary, children }
    }
}

/// A `json_schema_fields` value: either a single field name or a list of
/// them (spec.md §6: `map<string,string|list<string>>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// The `.excore.toml` workspace descriptor, read once at start-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceDescriptor {
    pub name: String,
    pub src_dir: String,
    pub base_dir: String,
    pub cache_base_dir: String,
    pub cache_dir: String,
    pub registry_cache_file: String,
    pub json_schema_file: String,
    pub class_mapping_file: String,
    pub registries: Vec<String>,
    pub primary_fields: Vec<String>,
    pub primary_to_registry: HashMap<String, String>,
    pub json_schema_fields: HashMap<String, OneOrMany>,
    pub props: HashMap<String, serde_json::Value>,
    pub excore_validate: bool,
    pub excore_manual_set: bool,
    pub excore_log_build_message: bool,
    /// Logging routing table, ambient stack carried regardless of the
    /// spec's feature Non-goals (see `excore_bootstrap::logging`).
    pub logging: Option<LoggingConfig>,
}

impl Default for WorkspaceDescriptor {
    fn default() -> Self {
        Self {
            name: "excore".to_string(),
            src_dir: "src".to_string(),
            base_dir: String::new(),
            cache_base_dir: String::new(),
            cache_dir: String::new(),
            registry_cache_file: "registry_cache.json".to_string(),
            json_schema_file: "schema.json".to_string(),
            class_mapping_file: "class_mapping.json".to_string(),
            registries: Vec::new(),
            primary_fields: Vec::new(),
            primary_to_registry: HashMap::new(),
            json_schema_fields: HashMap::new(),
            props: HashMap::new(),
            excore_validate: true,
            excore_manual_set: true,
            excore_log_build_message: false,
            logging: Some(default_logging_config()),
        }
    }
}

impl WorkspaceDescriptor {
    /// Parsed view over `registries` (spec.md §6 grammar).
    pub fn registry_decls(&self) -> Vec<RegistryDecl> {
        self.registries.iter().map(|r| RegistryDecl::parse(r)).collect()
    }

    /// Search `start` and its ancestors for `.excore.toml`.
    pub fn find_descriptor(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start);
        while let Some(d) = dir {
            let candidate = d.join(DESCRIPTOR_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = d.parent();
        }
        None
    }

    /// Load `.excore.toml` layered over built-in defaults, then apply
    /// `EXCORE_*` env overrides. Grounded on `AppConfig::load_layered`'s
    /// `Figment::new().merge(Serialized::defaults(..)).merge(Yaml::file(..))`
    /// shape, swapping `Yaml`/`APP__` for `Toml`/the spec's own env vars.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        use figment::{
            providers::{Format, Serialized, Toml},
            Figment,
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(WorkspaceDescriptor::default()))
            .merge(Toml::file(path.as_ref()));

        let mut descriptor: WorkspaceDescriptor = figment
            .extract()
            .with_context(|| format!("failed to load workspace descriptor from {:?}", path.as_ref()))?;

        descriptor.apply_env_overrides();
        descriptor.normalize_paths()?;
        Ok(descriptor)
    }

    /// Load the nearest `.excore.toml` found by walking up from `start`,
    /// or fall back to built-in defaults if none exists (the CLI's `init`
    /// subcommand is what actually creates one).
    pub fn load_or_default(start: &Path) -> Result<Self> {
        match Self::find_descriptor(start) {
            Some(path) => Self::load(path),
            None => {
                let mut descriptor = WorkspaceDescriptor::default();
                descriptor.apply_env_overrides();
                descriptor.normalize_paths()?;
                Ok(descriptor)
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("EXCORE_VALIDATE") {
            self.excore_validate = v != "0";
        }
        if let Ok(v) = std::env::var("EXCORE_MANUAL_SET") {
            self.excore_manual_set = v != "0";
        }
        if let Ok(v) = std::env::var("EXCORE_LOG_BUILD_MESSAGE") {
            self.excore_log_build_message = v == "1";
        }
    }

    /// Resolve `base_dir`/`cache_base_dir`/`cache_dir` into absolute paths,
    /// reusing the teacher's `resolve_home_dir` for the "no value given"
    /// default-subdirectory case.
    fn normalize_paths(&mut self) -> Result<()> {
        let base = if self.base_dir.trim().is_empty() {
            None
        } else {
            Some(self.base_dir.clone())
        };
        let resolved_base = resolve_home_dir(base, DEFAULT_SUBDIR, true)
            .context("failed to resolve workspace base_dir")?;
        self.base_dir = resolved_base.to_string_lossy().to_string();

        if self.cache_base_dir.trim().is_empty() {
            self.cache_base_dir = resolved_base.join("cache").to_string_lossy().to_string();
        }
        std::fs::create_dir_all(&self.cache_base_dir)
            .with_context(|| format!("failed to create cache_base_dir at {}", self.cache_base_dir))?;

        if self.cache_dir.trim().is_empty() {
            self.cache_dir = Path::new(&self.cache_base_dir)
                .join(&self.name)
                .to_string_lossy()
                .to_string();
        }
        std::fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("failed to create cache_dir at {}", self.cache_dir))?;

        Ok(())
    }

    pub fn registry_cache_path(&self) -> PathBuf {
        Path::new(&self.cache_dir).join(&self.registry_cache_file)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize workspace descriptor to TOML")
    }
}

/// Logging routing table: subsystem name → its console/file levels
/// (ambient stack; the teacher's `LoggingConfig`/`Section` shape is reused
/// near verbatim since it fits regardless of the spec's own Non-goals).
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub console_level: String,
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/excore.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

#[cfg(test)]
#[path = "config/tests.rs"]
mod tests;
