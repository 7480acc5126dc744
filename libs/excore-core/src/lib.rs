//! # excore-core
//!
//! The configuration pipeline at the heart of ExCore: a [`Registry`] of
//! named constructible targets, a [`ConfigDict`] resolver that turns a raw
//! TOML mapping into a graph of typed [`Node`]s, and a [`LazyConfig`]
//! builder that instantiates that graph while driving argument and
//! lifecycle hooks.
//!
//! See `SPEC_FULL.md` at the workspace root for the full design; this crate
//! implements components 1-5 of that document (Registry, Node model,
//! ConfigDict, hooks, LazyConfig). The workspace descriptor, CLI, and
//! logging subsystem live in `excore-bootstrap`/`excore-cli`.

pub mod config_dict;
pub mod context;
pub mod errors;
pub mod hooks;
pub mod lazy_config;
pub mod module_wrapper;
pub mod node;
pub mod registry;
pub mod sigil;
pub mod target;
pub mod value;

pub use config_dict::{ConfigDict, WorkspaceContext};
pub use context::{current_workspace, set_current_workspace};
pub use errors::{
    ConfigSupportError, ExcoreError, FetcherError, InstantiationError, ParseError, RegistryError,
    ResolutionError,
};
pub use hooks::{config_hooks, ArgumentHook, ConfigHookManager, LifecycleHook, CONFIG_STAGES};
pub use lazy_config::{BuildContext, BuildOutput, LazyConfig};
pub use module_wrapper::ModuleWrapper;
pub use node::{ModuleNode, Node, ParamMap, Priority};
pub use registry::{register_global, Registrator, Registry, RegistryPool, RegistrySnapshot};
pub use sigil::{parse_param, Decorator, ParsedParam, Sigil};
pub use target::{Factory, FnFactory, TargetDescriptor};
pub use value::{parse_literal, Value};

// Re-export the registration macro and the `inventory` plumbing it expands
// into, so a user crate only needs `excore-core` as a dependency, not
// `excore-macros` directly.
pub use excore_macros::register;
pub use inventory;
