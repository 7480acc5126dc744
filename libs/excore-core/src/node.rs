//! The `Node` model: every sigil flavor plus the shared machinery
//! (`update`/`reverse_update`, instantiation, caching) that sits behind
//! them.
//!
//! Grounded on `excore/config/model.py`: `ModuleNode`, `InterNode`,
//! `ReusedNode`, `ClassNode`, `ConfigHookNode`, and `_dispatch_module_node`.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::errors::{InstantiationError, ResolutionError};
use crate::sigil::Sigil;
use crate::target::TargetDescriptor;
use crate::value::Value;

/// A node's parameter map prior to instantiation.
pub type ParamMap = BTreeMap<String, Value>;

/// The priority used to decide whether a value resolved at a parameter site
/// should be written back into the node that produced it, per spec §4.2's
/// "cache-back-write" table: `Reused` and `Class` outrank a plain `Node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Plain,
    Class,
    Intermediate,
    Reference,
    Reused,
}

/// A single node in the configuration graph.
#[derive(Debug, Clone)]
pub enum Node {
    /// Built fresh every time it is referenced.
    Plain(ModuleNode),
    /// `$` — resolves to the target's class/type itself, never called.
    Class(ModuleNode),
    /// A lifecycle hook declaration (`ConfigHook` table entries).
    Hook(ModuleNode),
    /// `!` — a plain parameter holder with no backing target.
    Intermediate(ParamMap),
    /// `@` — built once, the result shared by every subsequent reference.
    Reused { node: ModuleNode, cache: Arc<OnceCell<Value>> },
    /// `&name` — a pointer to a node produced earlier in the same pass.
    Reference(String),
}

impl Node {
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Plain(m) | Node::Class(m) | Node::Hook(m) => Some(&m.target_name),
            Node::Reused { node, .. } => Some(&node.target_name),
            Node::Intermediate(_) => None,
            Node::Reference(n) => Some(n),
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Node::Plain(_) | Node::Hook(_) => Priority::Plain,
            Node::Intermediate(_) => Priority::Intermediate,
            Node::Reference(_) => Priority::Reference,
            Node::Class(_) => Priority::Class,
            Node::Reused { .. } => Priority::Reused,
        }
    }

    /// Dispatch a sigil-stripped key and its target descriptor to the right
    /// `Node` variant. Mirrors `_dispatch_module_node`.
    pub fn dispatch(sigil: Sigil, target_name: &str, descriptor: Option<TargetDescriptor>, params: ParamMap, no_call: bool) -> Result<Node, ResolutionError> {
        match sigil {
            Sigil::Reference => Ok(Node::Reference(target_name.to_string())),
            Sigil::Intermediate => Ok(Node::Intermediate(params)),
            Sigil::Class => {
                let descriptor = descriptor.ok_or_else(|| ResolutionError::UnknownTarget {
                    registry: String::new(),
                    name: target_name.to_string(),
                })?;
                Ok(Node::Class(ModuleNode::new(target_name, descriptor, params, true)))
            }
            Sigil::Reused => {
                let descriptor = descriptor.ok_or_else(|| ResolutionError::UnknownTarget {
                    registry: String::new(),
                    name: target_name.to_string(),
                })?;
                Ok(Node::Reused {
                    node: ModuleNode::new(target_name, descriptor, params, no_call),
                    cache: Arc::new(OnceCell::new()),
                })
            }
            Sigil::Plain => {
                let descriptor = descriptor.ok_or_else(|| ResolutionError::UnknownTarget {
                    registry: String::new(),
                    name: target_name.to_string(),
                })?;
                Ok(Node::Plain(ModuleNode::new(target_name, descriptor, params, no_call)))
            }
        }
    }

    /// Build this node into a value. `Reused` nodes consult/populate their
    /// shared cache; every other variant builds fresh.
    pub fn build(&self) -> Result<Value, InstantiationError> {
        match self {
            Node::Plain(m) => m.instantiate(),
            Node::Class(m) => Ok(m.descriptor.factory.as_class()),
            Node::Hook(_) => Ok(Value::Null),
            Node::Intermediate(params) => Value::Map(params.clone()).materialize(),
            Node::Reused { node, cache } => cache.get_or_try_init(|| node.instantiate()).cloned(),
            Node::Reference(name) => Err(InstantiationError::ModuleBuild {
                target: name.clone(),
                source: anyhow::anyhow!(
                    "reference nodes cannot be built directly; they must be substituted during resolution"
                ),
            }),
        }
    }
}

/// The callable backing for `Plain`/`Class`/`Reused` nodes: a target
/// descriptor plus its resolved parameter map.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub target_name: String,
    pub descriptor: TargetDescriptor,
    pub params: ParamMap,
    /// `__no_call__`: when set, building this node yields the parameter map
    /// itself rather than invoking the factory.
    pub no_call: bool,
}

impl ModuleNode {
    pub fn new(target_name: &str, descriptor: TargetDescriptor, params: ParamMap, no_call: bool) -> Self {
        Self {
            target_name: target_name.to_string(),
            descriptor,
            params,
            no_call,
        }
    }

    pub fn from_base_name(target_name: &str, descriptor: TargetDescriptor) -> Self {
        Self::new(target_name, descriptor, ParamMap::new(), false)
    }

    /// Shallow-merge `other`'s parameters into `self`, `other` winning on
    /// key conflicts. Mirrors `ModuleNode.__lshift__` (`node << other`).
    pub fn update(&mut self, other: &ParamMap) {
        for (k, v) in other {
            self.params.insert(k.clone(), v.clone());
        }
    }

    /// The reverse of [`update`](Self::update): `self`'s parameters win.
    /// Mirrors `ModuleNode.__rshift__`.
    pub fn reverse_update(&mut self, other: &ParamMap) {
        for (k, v) in other {
            self.params.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    fn missing_params(&self) -> Vec<&'static str> {
        self.descriptor
            .factory
            .required_params()
            .iter()
            .copied()
            .filter(|p| !self.params.contains_key(*p))
            .collect()
    }

    pub fn instantiate(&self) -> Result<Value, InstantiationError> {
        if let Some(missing) = self.missing_params().first() {
            return Err(InstantiationError::MissingParam {
                target: self.target_name.clone(),
                param: missing.to_string(),
            });
        }
        let mut materialized = ParamMap::new();
        for (k, v) in self.params.clone() {
            materialized.insert(k, v.materialize()?);
        }
        if self.no_call {
            return Ok(Value::Map(materialized));
        }
        self.descriptor
            .factory
            .call(materialized)
            .map_err(|source| InstantiationError::ModuleBuild {
                target: self.target_name.clone(),
                source,
            })
    }
}
