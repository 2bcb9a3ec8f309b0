//! Macro expansion inside component lists (builders, publishers, ...).
//!
//! A component list entry is either a bare name (`- run-tests`) or a
//! single-key mapping of name to parameters (`- run-tests: {suite: unit}`).
//! When the name refers to a macro of the list's kind, the macro's own
//! component list is spliced in at that position:
//!
//! - a bare reference is inserted verbatim, placeholders and all
//! - a reference with parameters is interpolated with those parameters
//!   (layered over the job's template binding, if any) before insertion

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::definition::MacroKind;
use crate::formatter::{FormatOptions, Formatter};
use crate::{DefinitionStore, Error, Result, Variables};

/// Maximum nesting of macros referring to other macros.
pub const MAX_MACRO_DEPTH: usize = 16;

pub struct MacroResolver<'a> {
    store: &'a DefinitionStore,
    options: FormatOptions,
}

impl<'a> MacroResolver<'a> {
    pub fn new(store: &'a DefinitionStore, options: FormatOptions) -> Self {
        Self { store, options }
    }

    /// Expand macros in every component list of a job.
    ///
    /// `template_vars` is the binding the job was realized with, when it came
    /// from a job-template.
    pub fn resolve_job(&self, mut job: Mapping, template_vars: Option<&Variables>) -> Result<Mapping> {
        let pipeline = job.get("project-type").and_then(Value::as_str) == Some("pipeline");

        for kind in MacroKind::ALL {
            if !self.store.has_macros(kind) {
                continue;
            }

            let list = if pipeline && kind == MacroKind::Scm {
                job.get_mut("pipeline-scm")
                    .and_then(Value::as_mapping_mut)
                    .and_then(|pipeline_scm| pipeline_scm.get_mut("scm"))
            } else {
                job.get_mut(kind.list_attribute())
            };

            if let Some(Value::Sequence(components)) = list {
                let expanded = self.resolve_list(kind, components, template_vars)?;
                *components = expanded;
            }
        }
        Ok(job)
    }

    /// Expand macros of `kind` in a component list, returning the new list.
    pub fn resolve_list(
        &self,
        kind: MacroKind,
        components: &[Value],
        template_vars: Option<&Variables>,
    ) -> Result<Vec<Value>> {
        self.resolve_list_in(kind, components, template_vars, &mut Vec::new())
    }

    fn resolve_list_in(
        &self,
        kind: MacroKind,
        components: &[Value],
        template_vars: Option<&Variables>,
        chain: &mut Vec<String>,
    ) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(components.len());

        for component in components {
            let Some((name, params)) = component_reference(component) else {
                out.push(component.clone());
                continue;
            };
            let Some(definition) = self.store.macro_definition(kind, name) else {
                out.push(component.clone());
                continue;
            };

            if chain.iter().any(|n| n == name) || chain.len() >= MAX_MACRO_DEPTH {
                let mut cycle = chain.clone();
                cycle.push(name.to_string());
                return Err(Error::MacroCycle { chain: cycle });
            }

            let body = match definition.get(kind.list_attribute()) {
                Some(Value::Sequence(body)) => body.clone(),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => {
                    return Err(Error::InvalidDefinition(format!(
                        "{} macro '{}' must define a '{}' list",
                        kind,
                        name,
                        kind.list_attribute()
                    )));
                }
            };

            let body = match params {
                Some(params) if !params.is_empty() => {
                    debug!(%kind, macro_name = name, "expanding macro with parameters");
                    let mut vars = template_vars.cloned().unwrap_or_default();
                    vars.extend_from_mapping(params);
                    let formatter = Formatter::new(&vars, self.options);
                    body.iter()
                        .map(|item| formatter.format_value(item))
                        .collect::<Result<Vec<_>>>()?
                }
                _ => {
                    debug!(%kind, macro_name = name, "expanding macro without parameters");
                    body
                }
            };

            chain.push(name.to_string());
            let expanded = self.resolve_list_in(kind, &body, template_vars, chain)?;
            chain.pop();
            out.extend(expanded);
        }
        Ok(out)
    }
}

/// Split a component entry into its name and optional parameters.
fn component_reference(component: &Value) -> Option<(&str, Option<&Mapping>)> {
    match component {
        Value::String(name) => Some((name.as_str(), None)),
        Value::Mapping(mapping) if mapping.len() == 1 => {
            let (name, params) = mapping.iter().next()?;
            Some((name.as_str()?, params.as_mapping()))
        }
        _ => None,
    }
}
