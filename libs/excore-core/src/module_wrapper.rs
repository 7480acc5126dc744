//! `ModuleWrapper` — the result of building a field's worth of sibling
//! nodes.
//!
//! Grounded on `excore/config/model.py::ModuleWrapper`, a `dict` subclass
//! that remembers whether its owning TOML table was a single inline table
//! (dict-shaped) or an array of tables (list-shaped), so callers can ask
//! for either "the one value" (`first`) or iterate every built instance.

use std::collections::BTreeMap;

use crate::value::Value;

/// Wraps the built value(s) of a single field.
#[derive(Debug, Clone)]
pub struct ModuleWrapper {
    values: BTreeMap<String, Value>,
    /// `true` if the field's TOML source was an inline table (one entry);
    /// `false` if it was an array of tables (possibly many entries).
    pub is_dict: bool,
}

impl ModuleWrapper {
    pub fn single(name: impl Into<String>, value: Value) -> Self {
        let mut values = BTreeMap::new();
        values.insert(name.into(), value);
        Self { values, is_dict: true }
    }

    pub fn many(values: BTreeMap<String, Value>) -> Self {
        Self { values, is_dict: false }
    }

    /// The first (and, for a dict-shaped field, only) built value.
    pub fn first(&self) -> Option<&Value> {
        self.values.values().next()
    }

    pub fn into_first(mut self) -> Option<Value> {
        self.values.pop_first().map(|(_, v)| v)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Collapse to the representation a downstream consumer sees: a single
    /// value for a dict-shaped field, a list for an array-shaped one.
    /// Mirrors `ModuleWrapper.__call__`'s dict-vs-list dispatch.
    pub fn collapse(self) -> Value {
        if self.is_dict {
            self.into_first().unwrap_or(Value::Null)
        } else {
            Value::List(self.values.into_values().collect())
        }
    }
}
