//! Error taxonomy for the configuration pipeline.
//!
//! Every fallible operation in this crate returns one of the variants below.
//! Nothing is swallowed inside the resolver or the builder: a failure at any
//! pass is propagated to the caller with enough context (target name,
//! parameter key, source file) to locate the offending TOML entry.

use thiserror::Error;

/// Top-level error type for the configuration engine.
#[derive(Debug, Error)]
pub enum ExcoreError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("instantiation error: {0}")]
    Instantiation(#[from] InstantiationError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("configuration support error: {0}")]
    ConfigSupport(#[from] ConfigSupportError),

    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),
}

/// Errors raised while turning raw TOML text into a `ConfigDict`.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("`__base__` entry in {path} must be a string or list of strings")]
    InvalidBase { path: String },

    #[error("cycle detected while resolving `__base__` chain starting at {path}")]
    BaseCycle { path: String },

    #[error("field `{field}` mixes a sigil-prefixed key with a plain key at the same level")]
    ConflictingSigil { field: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while resolving parameters and names against the registry.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no target named `{name}` found in registry `{registry}`")]
    UnknownTarget { registry: String, name: String },

    #[error("name `{name}` is ambiguous: it matches more than one field or top-level key")]
    AmbiguousName { name: String },

    #[error("no registry accepts field `{field}`")]
    NoRegistryForField { field: String },

    #[error("name `{name}` could not be resolved: not a field, top-level key, or registered module")]
    NameNotFound { name: String },

    #[error("environment variable `{var}` referenced in `${{{var}}}` is not set")]
    EnvVarNotSet { var: String },

    #[error("reused node `{name}` was referenced before any node populated its cache")]
    ReusedNotYetBuilt { name: String },

    #[error("reference `&{name}` does not point at a node produced earlier in the same pass")]
    DanglingReference { name: String },
}

/// Errors raised while instantiating a resolved node.
#[derive(Debug, Error)]
pub enum InstantiationError {
    #[error("failed to build `{target}`: {source}")]
    ModuleBuild {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("target `{target}` is missing required parameter `{param}`")]
    MissingParam { target: String, param: String },

    #[error("hook `{name}` returned an error: {source}")]
    HookFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors raised by the `Registry`/`RegistryPool`.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry name `{0}` must match ^[A-Za-z0-9_]+$")]
    InvalidName(String),

    #[error("registry `{0}` is locked and cannot accept further registrations")]
    Locked(String),

    #[error("target `{name}` is already registered in registry `{registry}`")]
    DuplicateTarget { registry: String, name: String },

    #[error("no registry named `{0}` exists in the pool")]
    UnknownRegistry(String),

    #[error("failed to acquire the registry cache file lock at {path}")]
    CacheLock { path: String },

    #[error("registry cache at {path} has version {found}, expected {expected}")]
    CacheVersionMismatch {
        path: String,
        found: u32,
        expected: u32,
    },

    #[error("failed to read or write registry cache at {path}: {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize registry cache at {path}: {source}")]
    CacheSerde {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by workspace-descriptor and CLI config support code.
#[derive(Debug, Error)]
pub enum ConfigSupportError {
    #[error("workspace descriptor at {path} is invalid: {source}")]
    InvalidDescriptor {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no `.excore.toml` found starting from {start}")]
    DescriptorNotFound { start: String },

    #[error("config extension `{0}` is not one of the registered extensions")]
    UnknownExtension(String),
}

/// Errors for the (out-of-scope-internals, in-scope-surface) model-hub fetcher.
///
/// No code in this workspace constructs these today; the variants exist so
/// that a future fetcher implementation has a stable error surface matching
/// the specification's taxonomy.
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("invalid repository spec `{0}`")]
    InvalidRepo(String),

    #[error("unsupported git host `{0}`")]
    InvalidGitHost(String),

    #[error("git pull failed: {0}")]
    GitPull(String),

    #[error("git checkout failed: {0}")]
    GitCheckout(String),

    #[error("unsupported protocol `{0}`")]
    InvalidProtocol(String),

    #[error("HTTP download failed: {0}")]
    HTTPDownload(String),
}
