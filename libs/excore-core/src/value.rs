//! The dynamic value model that flows through the resolver.
//!
//! Rust has no runtime `**kwargs`, so every parameter map a [`Node`] carries
//! is a `BTreeMap<String, Value>`. `Value` round-trips losslessly to and
//! from `toml::Value`, which keeps the dump/`quote` CLI path honest: a TOML
//! document parsed into `Value` and written back out reproduces the same
//! document modulo key ordering.
//!
//! [`Node`]: crate::node::Node

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ResolutionError;
use crate::module_wrapper::ModuleWrapper;
use crate::node::Node;

/// A fully or partially resolved configuration value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// An unresolved or resolved sub-node, kept around `Arc` so that
    /// `Reused` nodes can share a single build across every reference site.
    Node(Arc<Node>),
    /// The output of building a field's worth of sibling nodes.
    Wrapper(ModuleWrapper),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    /// Recursively resolve `${VAR}` references in every string leaf.
    ///
    /// Mirrors `excore/config/model.py::VariableReference`: a string that
    /// contains `${NAME}` is replaced by the environment variable's value;
    /// a reference to an unset variable is an error rather than silently
    /// left in place. Resolution recurses into maps and lists so a
    /// dict-valued parameter gets the same treatment as a bare string
    /// parameter (see the Open Question decision in DESIGN.md).
    pub fn resolve_env_vars(&mut self) -> Result<(), ResolutionError> {
        match self {
            Value::Str(s) => {
                if let Some(resolved) = expand_env_vars(s)? {
                    *s = resolved;
                }
            }
            Value::List(items) => {
                for item in items {
                    item.resolve_env_vars()?;
                }
            }
            Value::Map(map) => {
                for v in map.values_mut() {
                    v.resolve_env_vars()?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Returns `Ok(Some(expanded))` if `s` contained at least one `${VAR}`
/// reference, `Ok(None)` if it contained none (left as-is by the caller).
fn expand_env_vars(s: &str) -> Result<Option<String>, ResolutionError> {
    if !ENV_VAR_RE.is_match(s) {
        return Ok(None);
    }
    let mut err = None;
    let replaced = ENV_VAR_RE.replace_all(s, |caps: &regex::Captures| {
        let var = &caps[1];
        match std::env::var(var) {
            Ok(v) => v,
            Err(_) => {
                err.get_or_insert_with(|| ResolutionError::EnvVarNotSet {
                    var: var.to_string(),
                });
                String::new()
            }
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    Ok(Some(replaced.into_owned()))
}

impl Value {
    /// Recursively replace every [`Value::Node`]/[`Value::Wrapper`] leaf
    /// with its built result. Called just before a factory is invoked so
    /// that user constructors only ever see concrete data, never the
    /// resolver's internal node representation.
    pub fn materialize(self) -> Result<Value, crate::errors::InstantiationError> {
        match self {
            Value::Node(node) => node.build()?.materialize(),
            Value::Wrapper(wrapper) => wrapper.collapse().materialize(),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.materialize()?);
                }
                Ok(Value::List(out))
            }
            Value::Map(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k, v.materialize()?);
                }
                Ok(Value::Map(out))
            }
            other => Ok(other),
        }
    }
}

impl From<toml::Value> for Value {
    fn from(v: toml::Value) -> Self {
        match v {
            toml::Value::String(s) => Value::Str(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(f) => Value::Float(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(d) => Value::Str(d.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(t) => {
                Value::Map(t.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl TryFrom<Value> for toml::Value {
    type Error = ResolutionError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        Ok(match v {
            Value::Null => toml::Value::Table(Default::default()),
            Value::Bool(b) => toml::Value::Boolean(b),
            Value::Int(i) => toml::Value::Integer(i),
            Value::Float(f) => toml::Value::Float(f),
            Value::Str(s) => toml::Value::String(s),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(TryInto::<toml::Value>::try_into(item)?);
                }
                toml::Value::Array(out)
            }
            Value::Map(map) => {
                let mut out = toml::map::Map::new();
                for (k, v) in map {
                    out.insert(k, TryInto::<toml::Value>::try_into(v)?);
                }
                toml::Value::Table(out)
            }
            Value::Node(_) | Value::Wrapper(_) => {
                return Err(ResolutionError::NameNotFound {
                    name: "<unresolved node>".to_string(),
                })
            }
        })
    }
}

/// Parse a single literal token from a CLI `--set key=val` override or from
/// a reconstructed default value, per spec §4.5.
///
/// Supports bare words, quoted strings, numbers, booleans, `null`/`none`,
/// and bracket-balanced lists (`[1, 2, "three"]`) with comma splitting that
/// respects nested brackets and quotes.
pub fn parse_literal(input: &str) -> Value {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Value::Str(String::new());
    }
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        return Value::List(split_balanced(inner).into_iter().map(|s| parse_literal(&s)).collect());
    }
    if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        return Value::Str(trimmed[1..trimmed.len() - 1].to_string());
    }
    match trimmed {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "null" | "none" | "None" | "~" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Str(trimmed.to_string())
}

/// Split `s` on top-level commas, leaving commas nested inside `[]`/`{}`/
/// quotes untouched.
fn split_balanced(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '"' | '\'' => {
                match in_quote {
                    Some(q) if q == c => in_quote = None,
                    Some(_) => {}
                    None => in_quote = Some(c),
                }
                current.push(c);
            }
            '[' | '{' if in_quote.is_none() => {
                depth += 1;
                current.push(c);
            }
            ']' | '}' if in_quote.is_none() => {
                depth -= 1;
                current.push(c);
            }
            ',' if in_quote.is_none() && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current);
    }
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
