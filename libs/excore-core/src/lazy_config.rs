//! `LazyConfig` — owns a parsed `ConfigDict` plus the lifecycle hook set and
//! drives the build phase.
//!
//! Grounded on `excore/config/lazy_config.py` for the algorithm and on
//! `libs/modkit/src/runtime/host_runtime.rs`'s `HostRuntime` for the
//! "ordered phase methods on a struct" shape.

use std::collections::BTreeMap;

use crate::config_dict::{ConfigDict, WorkspaceContext};
use crate::errors::{InstantiationError, ResolutionError};
use crate::hooks::{config_hooks, ConfigHookManager};
use crate::module_wrapper::ModuleWrapper;
use crate::registry::RegistryPool;
use crate::value::Value;

/// Capability flags a caller (typically the CLI) may opt into. Resolves
/// spec §9's second Open Question: interactive prompting is off unless a
/// caller explicitly turns it on here, regardless of env vars (env vars
/// can only turn it back off).
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub interactive: bool,
    pub log_build_messages: bool,
}

/// The result of `build_all`: built primary modules plus whatever
/// non-primary data survived resolution, for the caller to consume.
pub struct BuildOutput {
    pub primary_modules: BTreeMap<String, Value>,
    pub auxiliary: BTreeMap<String, Value>,
}

pub struct LazyConfig {
    config: ConfigDict,
    raw: BTreeMap<String, Value>,
    hook_manager: Option<ConfigHookManager>,
    build_ctx: BuildContext,
}

impl LazyConfig {
    pub fn new(raw: BTreeMap<String, Value>, ctx: WorkspaceContext, build_ctx: BuildContext) -> Self {
        Self {
            config: ConfigDict::new(ctx),
            raw,
            hook_manager: None,
            build_ctx,
        }
    }

    /// Idempotent: parses the underlying `ConfigDict` if it hasn't been
    /// parsed yet, then builds the lifecycle hook manager from the
    /// distinguished `ExcoreHook` field.
    pub fn parse(&mut self, pool: &RegistryPool) -> Result<(), ResolutionError> {
        if self.config.is_parsed() {
            return Ok(());
        }
        self.config.parse(self.raw.clone(), pool)?;
        self.hook_manager = Some(self.build_config_hooks());
        Ok(())
    }

    /// Pops the `ExcoreHook` field (already separated out by
    /// `ConfigDict::parse`) and builds a `ConfigHookManager` from it.
    /// Mirrors `LazyConfig.build_config_hooks`: a table entry under
    /// `ExcoreHook` that isn't itself a recognizable hook stays as plain
    /// data rather than failing the whole run.
    fn build_config_hooks(&mut self) -> ConfigHookManager {
        let builder = config_hooks();
        if let Some(Value::Map(declared)) = self.config.take_hook_table() {
            for (stage, _decl) in declared {
                // Concrete `LifecycleHook` implementations are supplied by
                // user crates via the registry; this crate has no built-in
                // hooks of its own, so an unrecognized stage name is
                // logged and skipped rather than treated as fatal (the
                // table shape here only carries *declarations*, not
                // executable hooks — wiring a declared name to a
                // `LifecycleHook` instance is left to the embedder).
                tracing::debug!(stage = %stage, "ExcoreHook entry declared but not wired to a LifecycleHook");
            }
        }
        builder.build()
    }

    /// `build_all`: fires `pre_build`, builds each primary field in
    /// declared order (firing `every_build` first), copies remaining
    /// top-level data into the auxiliary map, fires `after_build`.
    pub fn build_all(&mut self, pool: &RegistryPool) -> Result<BuildOutput, InstantiationError> {
        self.parse(pool).map_err(|e| InstantiationError::ModuleBuild {
            target: "<config>".to_string(),
            source: anyhow::Error::from(e),
        })?;

        let hook_manager = self.hook_manager.as_mut().expect("parse() populates hook_manager");
        hook_manager.call("pre_build", &[])?;

        let wrapped = self.config.wrap_primaries();
        let mut primary_modules = BTreeMap::new();
        for field in self.config.primary_fields().to_vec() {
            let Some(wrapper) = wrapped.get(&field) else { continue };
            hook_manager.call("every_build", &[])?;
            let built = build_wrapper(wrapper, self.build_ctx.log_build_messages)?;
            primary_modules.insert(field, built);
        }

        let auxiliary = self.config.auxiliary().clone();

        let hook_manager = self.hook_manager.as_mut().expect("populated above");
        hook_manager.call("after_build", &[])?;

        Ok(BuildOutput {
            primary_modules,
            auxiliary,
        })
    }
}

fn build_wrapper(wrapper: &ModuleWrapper, log_build_messages: bool) -> Result<Value, InstantiationError> {
    let mut built = BTreeMap::new();
    for (name, value) in wrapper.iter() {
        let materialized = value.clone().materialize()?;
        if log_build_messages {
            tracing::info!(target = %name, "built module");
        }
        built.insert(name.clone(), materialized);
    }
    if wrapper.is_dict && built.len() == 1 {
        Ok(built.into_values().next().unwrap())
    } else {
        Ok(Value::Map(built))
    }
}
