//! Variable bindings used for template interpolation.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::definition::scalar_to_string;

/// An ordered name -> value binding.
///
/// Later writes win, so bindings are built by layering sources from lowest
/// to highest priority.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    vars: IndexMap<String, Value>,
}

impl Variables {
    /// Create an empty binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a binding from a YAML mapping. Non-scalar keys are skipped.
    pub fn from_mapping(mapping: &Mapping) -> Self {
        let mut vars = Self::new();
        vars.extend_from_mapping(mapping);
        vars
    }

    /// Bind a single variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Look up a variable.
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Remove a variable, preserving the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    /// Layer every entry of `mapping` over this binding.
    pub fn extend_from_mapping(&mut self, mapping: &Mapping) {
        for (key, value) in mapping {
            if let Some(key) = scalar_to_string(key) {
                self.vars.insert(key, value.clone());
            }
        }
    }

    /// Layer another binding over this one.
    pub fn extend(&mut self, other: &Variables) {
        for (key, value) in &other.vars {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
