//! `ConfigDict` — the multi-pass resolver.
//!
//! Grounded on `excore/config/parse.py`'s `AttrNode`: a raw TOML mapping is
//! rewritten in place into a graph of [`Node`]s with every cross-reference
//! resolved. See spec §4.3 for the five-pass algorithm this module
//! implements pass-by-pass.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::errors::{ParseError, ResolutionError};
use crate::module_wrapper::ModuleWrapper;
use crate::node::{Node, ParamMap};
use crate::registry::RegistryPool;
use crate::sigil::{Decorator, ParsedParam, Sigil};
use crate::value::Value;

const BASE_KEY: &str = "__base__";
const NO_CALL_KEY: &str = "__no_call__";
pub const HOOK_FIELD: &str = "ExcoreHook";

/// The workspace knobs the resolver needs: which top-level fields are
/// primary, and how a primary field maps onto a registry when its own name
/// isn't itself a registry name.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceContext {
    pub primary_fields: Vec<String>,
    pub primary_to_registry: HashMap<String, String>,
    pub validate: bool,
}

/// Where a short name was declared, used for the name-lookup ambiguity
/// check (spec §4.3 rule 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Primary,
    Scratchpad,
}

/// The resolver's working state. Constructed from a raw TOML mapping,
/// mutated in place by [`ConfigDict::parse`].
pub struct ConfigDict {
    ctx: WorkspaceContext,
    /// Every node that exists after passes 1-2, flat, keyed by short name.
    nodes: HashMap<String, Node>,
    /// container name (field or scratchpad) -> ordered list of its children.
    containers: HashMap<String, Vec<String>>,
    container_kind: HashMap<String, ContainerKind>,
    /// short name -> containers that declared it (only Primary/Scratchpad
    /// containers are indexed here; hoisted entries are not ambiguous by
    /// construction since the flat `nodes` map already enforces uniqueness).
    child_to_containers: HashMap<String, Vec<String>>,
    /// Names that live at the flat top level (registered-field entries,
    /// resolved-K wraps, and implicit modules hoisted by rule 5).
    hoisted: HashSet<String>,
    auxiliary: BTreeMap<String, Value>,
    hook_table: Option<Value>,
    parsed: bool,
}

impl ConfigDict {
    /// Parse raw TOML text into an unresolved `ConfigDict`. Does not run
    /// the five-pass resolver yet; call [`parse`](Self::parse) for that.
    pub fn from_toml_str(text: &str, path: &str) -> Result<BTreeMap<String, Value>, ParseError> {
        let table: toml::Table = toml::from_str(text).map_err(|source| ParseError::Toml {
            path: path.to_string(),
            source,
        })?;
        let Value::Map(map) = Value::from(toml::Value::Table(table)) else {
            unreachable!("a TOML table always converts to Value::Map")
        };
        Ok(map)
    }

    /// Shallow-merge `base` underneath `overlay`: `overlay`'s keys win.
    /// Used to apply `__base__` (spec §6: "later overrides earlier; the
    /// current file overrides all bases").
    pub fn merge_over(base: BTreeMap<String, Value>, overlay: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        let mut merged = base;
        for (k, v) in overlay {
            merged.insert(k, v);
        }
        merged
    }

    /// Read `path` and recursively resolve its `__base__` chain: `__base__`
    /// may be a single path or a list of paths, each relative to the file
    /// declaring it; earlier bases are overridden by later ones, and the
    /// declaring file overrides every base it names. Returns the fully
    /// merged, `__base__`-free top-level map ready for [`parse`](Self::parse).
    pub fn load_toml_file_with_bases(path: &std::path::Path) -> Result<BTreeMap<String, Value>, ParseError> {
        let mut seen = HashSet::new();
        Self::load_with_bases_inner(path, &mut seen)
    }

    fn load_with_bases_inner(
        path: &std::path::Path,
        seen: &mut HashSet<std::path::PathBuf>,
    ) -> Result<BTreeMap<String, Value>, ParseError> {
        let display_path = path.display().to_string();
        let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !seen.insert(canon.clone()) {
            return Err(ParseError::BaseCycle { path: display_path });
        }

        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: display_path.clone(),
            source,
        })?;
        let mut raw = Self::from_toml_str(&text, &display_path)?;
        let base_entry = raw.remove(BASE_KEY);

        let mut merged = BTreeMap::new();
        if let Some(entry) = base_entry {
            let base_paths: Vec<String> = match entry {
                Value::Str(s) => vec![s],
                Value::List(items) => {
                    let mut paths = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Str(s) => paths.push(s),
                            _ => return Err(ParseError::InvalidBase { path: display_path.clone() }),
                        }
                    }
                    paths
                }
                _ => return Err(ParseError::InvalidBase { path: display_path.clone() }),
            };

            let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            for base_path in base_paths {
                let resolved = parent.join(&base_path);
                let base_map = Self::load_with_bases_inner(&resolved, seen)?;
                merged = Self::merge_over(merged, base_map);
            }
        }

        merged = Self::merge_over(merged, raw);
        seen.remove(&canon);
        Ok(merged)
    }

    pub fn new(ctx: WorkspaceContext) -> Self {
        Self {
            ctx,
            nodes: HashMap::new(),
            containers: HashMap::new(),
            container_kind: HashMap::new(),
            child_to_containers: HashMap::new(),
            hoisted: HashSet::new(),
            auxiliary: BTreeMap::new(),
            hook_table: None,
            parsed: false,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    pub fn primary_fields(&self) -> &[String] {
        &self.ctx.primary_fields
    }

    pub fn take_hook_table(&mut self) -> Option<Value> {
        self.hook_table.take()
    }

    pub fn auxiliary(&self) -> &BTreeMap<String, Value> {
        &self.auxiliary
    }

    /// Run the five-pass resolver over `raw`. Idempotent: calling `parse`
    /// a second time on an already-parsed `ConfigDict` is a no-op
    /// (spec §8 invariant 1).
    pub fn parse(&mut self, mut raw: BTreeMap<String, Value>, pool: &RegistryPool) -> Result<(), ResolutionError> {
        if self.parsed {
            return Ok(());
        }

        self.hook_table = raw.remove(HOOK_FIELD);
        raw.remove(BASE_KEY);

        // Pass 1 — primary fields.
        {
            let _span = tracing::trace_span!("resolver_pass", pass = "primary_fields").entered();
            for field in self.ctx.primary_fields.clone() {
                if let Some(Value::Map(children)) = raw.remove(&field) {
                    let base_registry = self.base_registry_for(&field, pool)?;
                    self.build_container(&field, ContainerKind::Primary, &base_registry, children, pool)?;
                }
            }
        }

        // Pass 2 — non-primary roots.
        {
            let _span = tracing::trace_span!("resolver_pass", pass = "non_primary_roots").entered();
            let remaining_keys: Vec<String> = raw.keys().cloned().collect();
            for key in remaining_keys {
                let value = raw.remove(&key).unwrap();
                self.resolve_root(&key, value, pool)?;
            }
        }

        // Pass 3 — parameter resolution.
        {
            let _span = tracing::trace_span!("resolver_pass", pass = "parameter_resolution").entered();
            let node_names: Vec<String> = self.nodes.keys().cloned().collect();
            for name in node_names {
                self.resolve_node_params(&name, pool)?;
            }
            for v in self.auxiliary.values_mut() {
                v.resolve_env_vars()?;
            }
        }

        self.parsed = true;
        Ok(())
    }

    fn base_registry_for(&self, field: &str, pool: &RegistryPool) -> Result<String, ResolutionError> {
        if pool.get(field).is_some() {
            return Ok(field.to_string());
        }
        self.ctx
            .primary_to_registry
            .get(field)
            .cloned()
            .ok_or_else(|| ResolutionError::NoRegistryForField {
                field: field.to_string(),
            })
    }

    /// Build every child of a primary-field or scratchpad table into a
    /// `Plain` node, recording container membership for later ambiguity
    /// checks (rule 4) and for pass-4 wrapping.
    fn build_container(
        &mut self,
        container: &str,
        kind: ContainerKind,
        base_registry: &str,
        children: BTreeMap<String, Value>,
        pool: &RegistryPool,
    ) -> Result<(), ResolutionError> {
        self.container_kind.insert(container.to_string(), kind);
        let mut order = Vec::with_capacity(children.len());
        for (short_name, params_value) in children {
            let mut params = value_as_param_map(params_value);
            let no_call = take_no_call_flag(&mut params);
            let registry = pool.get_or_create(base_registry).map_err(|_| ResolutionError::UnknownTarget {
                registry: base_registry.to_string(),
                name: short_name.clone(),
            })?;
            let descriptor = registry.get(&short_name).ok_or_else(|| ResolutionError::UnknownTarget {
                registry: base_registry.to_string(),
                name: short_name.clone(),
            })?;
            self.insert_node(&short_name, Node::Plain(crate::node::ModuleNode::new(&short_name, descriptor, params, no_call)))?;
            self.child_to_containers
                .entry(short_name.clone())
                .or_default()
                .push(container.to_string());
            order.push(short_name);
        }
        self.containers.insert(container.to_string(), order);
        Ok(())
    }

    fn insert_node(&mut self, name: &str, node: Node) -> Result<(), ResolutionError> {
        if let Some(existing) = self.nodes.get(name) {
            if existing.priority() != node.priority() {
                return Err(ResolutionError::AmbiguousName { name: name.to_string() });
            }
        }
        self.nodes.insert(name.to_string(), node);
        Ok(())
    }

    /// Pass 2 for a single top-level key: registered field, resolvable
    /// single target, scratchpad, or opaque auxiliary data.
    fn resolve_root(&mut self, key: &str, value: Value, pool: &RegistryPool) -> Result<(), ResolutionError> {
        if pool.get(key).is_some() {
            if let Value::Map(children) = value {
                self.build_container(key, ContainerKind::Scratchpad, key, children, pool)?;
                // registered-field entries are isolated modules: hoist every
                // child to the flat top level instead of leaving them as a
                // primary-only lookup scope.
                if let Some(names) = self.containers.get(key).cloned() {
                    for n in names {
                        self.hoisted.insert(n);
                    }
                }
            }
            return Ok(());
        }

        if pool.find(key).is_some() {
            let mut params = value_as_param_map(value);
            let no_call = take_no_call_flag(&mut params);
            let registry_name = pool.find(key).expect("checked above");
            let registry = pool.get_or_create(&registry_name).expect("just found");
            let descriptor = registry.get(key).expect("just found");
            self.insert_node(key, Node::Plain(crate::node::ModuleNode::new(key, descriptor, params, no_call)))?;
            self.hoisted.insert(key.to_string());
            return Ok(());
        }

        if let Value::Map(children) = &value {
            let all_resolve = !children.is_empty() && children.keys().all(|c| pool.find(c).is_some());
            if all_resolve {
                let Value::Map(children) = value else { unreachable!() };
                self.build_container(key, ContainerKind::Scratchpad, "", children, pool)?;
                return Ok(());
            }
        }

        self.auxiliary.insert(key.to_string(), value);
        Ok(())
    }

    /// Pass 3 for a single already-built node: rewrite every sigil-prefixed
    /// parameter key into a resolved cross-reference.
    fn resolve_node_params(&mut self, name: &str, pool: &RegistryPool) -> Result<(), ResolutionError> {
        let params = match self.nodes.get(name) {
            Some(Node::Plain(m)) | Some(Node::Class(m)) => m.params.clone(),
            Some(Node::Reused { node, .. }) => node.params.clone(),
            _ => return Ok(()),
        };

        let mut resolved = ParamMap::new();
        for (key, value) in params {
            let (sigil, stripped) = Sigil::strip(&key);
            if sigil == Sigil::Plain {
                let mut v = value;
                v.resolve_env_vars()?;
                resolved.insert(key, v);
                continue;
            }
            let resolved_value = self.resolve_sigil_value(sigil, &value, pool)?;
            resolved.insert(stripped.to_string(), resolved_value);
        }

        match self.nodes.get_mut(name) {
            Some(Node::Plain(m)) | Some(Node::Class(m)) => m.params = resolved,
            Some(Node::Reused { node, .. }) => node.params = resolved,
            _ => {}
        }
        Ok(())
    }

    fn resolve_sigil_value(&mut self, sigil: Sigil, value: &Value, pool: &RegistryPool) -> Result<Value, ResolutionError> {
        match value {
            Value::Str(s) => self.resolve_sigil_name(sigil, s, pool),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_sigil_value(sigil, item, pool)?);
                }
                Ok(Value::List(out))
            }
            Value::Map(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_sigil_value(sigil, v, pool)?);
                }
                Ok(Value::Map(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_sigil_name(&mut self, sigil: Sigil, raw_name: &str, pool: &RegistryPool) -> Result<Value, ResolutionError> {
        if sigil == Sigil::Reference {
            return self.resolve_reference(raw_name);
        }

        let parsed = crate::sigil::parse_param(raw_name);
        let node = self.lookup_name(sigil, &parsed, pool)?;
        let node = apply_decorators(node, &parsed.decorators);
        Ok(Value::Node(std::sync::Arc::new(node)))
    }

    fn resolve_reference(&mut self, raw_name: &str) -> Result<Value, ResolutionError> {
        if raw_name.starts_with("${") {
            let mut v = Value::Str(raw_name.to_string());
            v.resolve_env_vars()?;
            return Ok(v);
        }
        if let Some(node) = self.nodes.get(raw_name) {
            return Ok(Value::Node(std::sync::Arc::new(node.clone())));
        }
        if let Some(v) = self.auxiliary.get(raw_name) {
            return Ok(v.clone());
        }
        Err(ResolutionError::DanglingReference { name: raw_name.to_string() })
    }

    /// Name-lookup rules 1-5 (spec §4.3).
    fn lookup_name(&mut self, sigil: Sigil, parsed: &ParsedParam, pool: &RegistryPool) -> Result<Node, ResolutionError> {
        let name = &parsed.base;

        // Rule 1: `field::name`.
        if let Some((field, target)) = name.split_once("::") {
            if target == "*" {
                // Fan-out is a caller-level concern (produces multiple
                // nodes); single-value call sites take the first in
                // declaration order, matching ModuleWrapper::first.
                if let Some(children) = self.containers.get(field) {
                    if let Some(first) = children.first().cloned() {
                        return self.materialize_named(sigil, &first, pool);
                    }
                }
                return Err(ResolutionError::NameNotFound { name: name.clone() });
            }
            if self.containers.get(field).map(|c| c.contains(&target.to_string())).unwrap_or(false) {
                return self.materialize_named(sigil, target, pool);
            }
            if let Some(reg) = pool.get(field) {
                if reg.contains(target) {
                    return self.materialize_unowned(sigil, target, field, pool);
                }
            }
            return Err(ResolutionError::UnknownTarget {
                registry: field.to_string(),
                name: target.to_string(),
            });
        }

        // Rule 2: a container of exactly one child, named `name`.
        if let Some(children) = self.containers.get(name) {
            if children.len() == 1 {
                let only = children[0].clone();
                return self.materialize_named(sigil, &only, pool);
            }
        }

        // Rule 3: already at the flat top level.
        if self.hoisted.contains(name) {
            return self.materialize_named(sigil, name, pool);
        }

        // Rule 4: child of exactly one primary/scratchpad container.
        if let Some(containers) = self.child_to_containers.get(name) {
            match containers.len() {
                1 => return self.materialize_named(sigil, name, pool),
                0 => {}
                _ => return Err(ResolutionError::AmbiguousName { name: name.clone() }),
            }
        }

        // Rule 5: implicit module via Registry::find, hoisted on success.
        if let Some(registry_name) = pool.find(name) {
            return self.materialize_unowned(sigil, name, &registry_name, pool);
        }

        Err(ResolutionError::NameNotFound { name: name.clone() })
    }

    /// Retrieve (and, for `!`/`@` sigils, re-tag in place per the priority
    /// rule) a node that already exists in `self.nodes`.
    fn materialize_named(&mut self, sigil: Sigil, name: &str, pool: &RegistryPool) -> Result<Node, ResolutionError> {
        let existing = self.nodes.get(name).cloned();
        let Some(existing) = existing else {
            return self.materialize_unowned(sigil, name, "", pool);
        };
        let retagged = retag(existing, sigil, name)?;
        if retagged.priority() > self.nodes.get(name).map(|n| n.priority()).unwrap_or(retagged.priority()) {
            self.nodes.insert(name.to_string(), retagged.clone());
        }
        Ok(retagged)
    }

    /// A name resolved via `Registry::find`/explicit field that has no
    /// existing node yet: build one fresh and hoist it (rule 5's "hoisted
    /// to the top level so identity is preserved").
    fn materialize_unowned(&mut self, sigil: Sigil, name: &str, registry_hint: &str, pool: &RegistryPool) -> Result<Node, ResolutionError> {
        let registry_name = if registry_hint.is_empty() {
            pool.find(name).ok_or_else(|| ResolutionError::NameNotFound { name: name.to_string() })?
        } else {
            registry_hint.to_string()
        };
        let registry = pool.get_or_create(&registry_name).map_err(|_| ResolutionError::UnknownTarget {
            registry: registry_name.clone(),
            name: name.to_string(),
        })?;
        let descriptor = registry.get(name).ok_or_else(|| ResolutionError::UnknownTarget {
            registry: registry_name.clone(),
            name: name.to_string(),
        })?;
        let module = crate::node::ModuleNode::from_base_name(name, descriptor);
        let node = match sigil {
            Sigil::Class => Node::Class(module),
            Sigil::Reused => Node::Reused {
                node: module,
                cache: std::sync::Arc::new(once_cell::sync::OnceCell::new()),
            },
            Sigil::Intermediate => Node::Intermediate(module.params),
            _ => Node::Plain(module),
        };
        self.nodes.insert(name.to_string(), node.clone());
        self.hoisted.insert(name.to_string());
        Ok(node)
    }

    /// Pass 4 + 5: wrap every primary field's children in a `ModuleWrapper`
    /// and return the map the caller (`LazyConfig`) iterates.
    pub fn wrap_primaries(&self) -> BTreeMap<String, ModuleWrapper> {
        let mut out = BTreeMap::new();
        for field in &self.ctx.primary_fields {
            let Some(children) = self.containers.get(field) else { continue };
            if self.container_kind.get(field) != Some(&ContainerKind::Primary) {
                continue;
            }
            let is_dict = children.len() == 1;
            let mut values = BTreeMap::new();
            for child in children {
                if let Some(node) = self.nodes.get(child) {
                    values.insert(child.clone(), Value::Node(std::sync::Arc::new(node.clone())));
                }
            }
            out.insert(field.clone(), ModuleWrapper::many(values).with_is_dict(is_dict));
        }
        out
    }
}

fn value_as_param_map(value: Value) -> ParamMap {
    match value {
        Value::Map(m) => m,
        other => {
            let mut m = ParamMap::new();
            m.insert("value".to_string(), other);
            m
        }
    }
}

fn take_no_call_flag(params: &mut ParamMap) -> bool {
    match params.remove(NO_CALL_KEY) {
        Some(Value::Bool(b)) => b,
        _ => false,
    }
}

/// Apply `.attr`/`.attr()` postfix decorators to a resolved node by
/// wrapping it as an intermediate accessor. Since there is no runtime
/// reflection, attribute access is only meaningful once the node is built;
/// we encode the decorator chain into the node's parameters under a
/// reserved key so `Factory` authors that expose structured output (a
/// `Value::Map`) can honor it, matching `ChainedInvocationWrapper`'s role
/// in the original resolver.
fn apply_decorators(node: Node, decorators: &[Decorator]) -> Node {
    if decorators.is_empty() {
        return node;
    }
    let chain: Vec<String> = decorators
        .iter()
        .map(|d| match d {
            Decorator::Attr(a) => a.clone(),
            Decorator::Call(a) => format!("{a}()"),
        })
        .collect();
    match node {
        Node::Plain(mut m) => {
            m.params.insert("__attr_chain__".to_string(), Value::List(chain.into_iter().map(Value::Str).collect()));
            Node::Plain(m)
        }
        other => other,
    }
}

/// Retag an existing node for a new sigil use-site, enforcing the
/// Reused<->Intermediate conflict rule (spec §4.3, §3 invariant i).
fn retag(node: Node, sigil: Sigil, name: &str) -> Result<Node, ResolutionError> {
    use Sigil::*;
    match (node, sigil) {
        (Node::Intermediate(_), Reused) | (Node::Reused { .. }, Intermediate) => {
            Err(ResolutionError::AmbiguousName { name: name.to_string() })
        }
        (n, Class) => match n {
            Node::Plain(m) | Node::Reused { node: m, .. } => Ok(Node::Class(m)),
            other => Ok(other),
        },
        (Node::Plain(m), Reused) => Ok(Node::Reused { node: m, cache: std::sync::Arc::new(once_cell::sync::OnceCell::new()) }),
        (Node::Plain(m), Intermediate) => Ok(Node::Intermediate(m.params)),
        (n, _) => Ok(n),
    }
}

impl ModuleWrapper {
    fn with_is_dict(mut self, is_dict: bool) -> Self {
        self.is_dict = is_dict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Factory, TargetDescriptor};
    use std::sync::Arc;

    struct EchoFactory(&'static str);
    impl Factory for EchoFactory {
        fn call(&self, params: ParamMap) -> anyhow::Result<Value> {
            Ok(Value::Map(params))
        }
        fn dotted_path(&self) -> &'static str {
            self.0
        }
    }

    fn ctx(primary: &[&str]) -> WorkspaceContext {
        WorkspaceContext {
            primary_fields: primary.iter().map(|s| s.to_string()).collect(),
            primary_to_registry: HashMap::new(),
            validate: true,
        }
    }

    fn register(pool: &RegistryPool, registry: &str, name: &'static str) {
        let reg = pool.get_or_create(registry).unwrap();
        reg.register(name, Arc::new(EchoFactory(name)), HashMap::new()).unwrap();
    }

    #[test]
    fn shared_backbone_scenario_a() {
        let pool = RegistryPool::global();
        register(pool, "Model", "FCN");
        register(pool, "Model", "DeepLab");
        register(pool, "Backbone", "ResNet");

        let toml = r#"
            [Model.FCN]
            "!backbone" = "ResNet"
            [Model.DeepLab]
            "!backbone" = "ResNet"
            [Backbone.ResNet]
            depth = 50
        "#;
        let raw = ConfigDict::from_toml_str(toml, "scenario_a.toml").unwrap();
        let mut cfg = ConfigDict::new(ctx(&["Model", "Backbone"]));
        cfg.parse(raw, pool).unwrap();

        let fcn_backbone = cfg.nodes.get("FCN").and_then(|n| match n {
            Node::Plain(m) => m.params.get("backbone").cloned(),
            _ => None,
        });
        assert!(fcn_backbone.is_some());
    }

    #[test]
    fn reused_hoisting_scenario_b() {
        let pool = RegistryPool::global();
        register(pool, "Model", "FCN2");
        register(pool, "ResNet2", "ResNet2");

        let toml = r#"
            [Model.FCN2]
            "@shared" = "ResNet2"
            [ResNet2]
            depth = 50
        "#;
        let raw = ConfigDict::from_toml_str(toml, "scenario_b.toml").unwrap();
        let mut cfg = ConfigDict::new(ctx(&["Model"]));
        cfg.parse(raw, pool).unwrap();
        assert!(cfg.hoisted.contains("ResNet2") || cfg.nodes.contains_key("ResNet2"));
    }

    #[test]
    fn env_expansion_scenario_f() {
        std::env::set_var("EXCORE_TEST_HOME", "/home/test");
        let pool = RegistryPool::global();
        let toml = r#"
            [Paths]
            log = "${EXCORE_TEST_HOME}/logs"
        "#;
        let raw = ConfigDict::from_toml_str(toml, "scenario_f.toml").unwrap();
        let mut cfg = ConfigDict::new(ctx(&[]));
        cfg.parse(raw, pool).unwrap();
        let paths = cfg.auxiliary.get("Paths").unwrap();
        let log = paths.as_map().unwrap().get("log").unwrap().as_str().unwrap();
        assert_eq!(log, "/home/test/logs");
    }

    #[test]
    fn reference_in_nested_map() {
        let pool = RegistryPool::global();
        register(pool, "Model", "WithNestedRef");

        let toml = r#"
            [Paths]
            log = "/var/log/app"

            [Model.WithNestedRef]
            opts = { primary = "&Paths", nested = { secondary = "&Paths" } }
        "#;
        let raw = ConfigDict::from_toml_str(toml, "nested_ref.toml").unwrap();
        let mut cfg = ConfigDict::new(ctx(&["Model"]));
        cfg.parse(raw, pool).unwrap();

        let opts = cfg.nodes.get("WithNestedRef").and_then(|n| match n {
            Node::Plain(m) => m.params.get("opts").cloned(),
            _ => None,
        }).expect("opts param present");
        let opts_map = opts.as_map().expect("opts resolved to a map");
        assert!(matches!(opts_map.get("primary"), Some(Value::Node(_))));
        let nested = opts_map.get("nested").and_then(Value::as_map).expect("nested map");
        assert!(matches!(nested.get("secondary"), Some(Value::Node(_))));
    }

    #[test]
    fn base_merge_overrides_earlier_bases_and_is_overridden_by_the_declaring_file() {
        let dir = tempfile_dir_for_test();
        std::fs::write(
            dir.join("common.toml"),
            "[Server]\nhost = \"0.0.0.0\"\nport = 8000\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("staging.toml"),
            "__base__ = \"common.toml\"\n[Server]\nport = 9000\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("local.toml"),
            "__base__ = [\"staging.toml\"]\n[Server]\nhost = \"127.0.0.1\"\n",
        )
        .unwrap();

        let merged = ConfigDict::load_toml_file_with_bases(&dir.join("local.toml")).unwrap();
        assert!(!merged.contains_key("__base__"));
        let server = merged.get("Server").unwrap().as_map().unwrap();
        assert_eq!(server.get("host").unwrap().as_str().unwrap(), "127.0.0.1");
        assert!(matches!(server.get("port").unwrap(), Value::Int(9000)));
    }

    #[test]
    fn base_cycle_is_detected() {
        let dir = tempfile_dir_for_test();
        std::fs::write(dir.join("a.toml"), "__base__ = \"b.toml\"\n").unwrap();
        std::fs::write(dir.join("b.toml"), "__base__ = \"a.toml\"\n").unwrap();

        let err = ConfigDict::load_toml_file_with_bases(&dir.join("a.toml")).unwrap_err();
        assert!(matches!(err, ParseError::BaseCycle { .. }));
    }

    fn tempfile_dir_for_test() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "excore-core-base-merge-test-{:?}",
            std::thread::current().id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
