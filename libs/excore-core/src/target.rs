//! Registered construction targets.
//!
//! Python's `excore` resolves a registry entry to a class by dotted-path
//! import at call time (`excore/config/model.py::_str_to_target`). Rust has
//! no equivalent of `importlib.import_module`, so a target here is a
//! `Factory`: a small trait object that a crate registers once, either by
//! hand or via `#[excore::register(...)]` (see `excore-macros`).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A constructible target: something a `$`/plain/`!` node can call.
pub trait Factory: Send + Sync {
    /// Parameter names the underlying constructor requires. Used to
    /// validate a node's argument map before instantiation and to surface
    /// `InstantiationError::MissingParam` instead of a generic failure.
    fn required_params(&self) -> &'static [&'static str] {
        &[]
    }

    /// Build an instance of the target from its resolved parameter map.
    fn call(&self, params: BTreeMap<String, Value>) -> anyhow::Result<Value>;

    /// What a `$`-sigil (Class) node should yield: typically a value that
    /// identifies the class/type itself rather than an instance of it.
    fn as_class(&self) -> Value {
        Value::Str(self.dotted_path().to_string())
    }

    /// The fully-qualified name this factory was registered under.
    fn dotted_path(&self) -> &'static str;
}

/// An entry in a [`Registry`](crate::registry::Registry): a name paired
/// with the factory that builds it.
#[derive(Clone)]
pub struct TargetDescriptor {
    pub name: &'static str,
    pub factory: Arc<dyn Factory>,
}

impl fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDescriptor").field("name", &self.name).finish()
    }
}

/// Adapts a plain function pointer into a [`Factory`], for targets that
/// don't need a struct of their own (the common case for
/// `#[excore::register]`-annotated free functions).
pub struct FnFactory {
    pub dotted_path: &'static str,
    pub required: &'static [&'static str],
    pub f: fn(BTreeMap<String, Value>) -> anyhow::Result<Value>,
}

impl Factory for FnFactory {
    fn required_params(&self) -> &'static [&'static str] {
        self.required
    }

    fn call(&self, params: BTreeMap<String, Value>) -> anyhow::Result<Value> {
        (self.f)(params)
    }

    fn dotted_path(&self) -> &'static str {
        self.dotted_path
    }
}
