//! Project expansion: turning job-templates into concrete jobs.
//!
//! For every project, each entry of its `jobs` list names a job, a job-group
//! or a job-template. Templates are realized once per combination of the
//! project's list-valued variables that appear in the template's name, minus
//! combinations matched by an `exclude` rule.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::definition::{DefinitionKind, RawDefinition, scalar_to_string};
use crate::formatter::{FormatOptions, Formatter, referenced_variables, render_value};
use crate::{DefinitionStore, Error, JobFilter, MacroResolver, Result, Variables, Warning};

/// Marker appended to descriptions of jobs this tool manages.
pub const MANAGED_MARKER: &str = "<!-- Managed by Jenkins Job Builder -->";

/// Variable always bound to the pre-substitution name of the template.
pub const TEMPLATE_NAME_VAR: &str = "template-name";

/// Options recognized by the expansion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionOptions {
    pub allow_empty_variables: bool,
    pub allow_duplicates: bool,
    pub keep_descriptions: bool,
    pub param_order_from_yaml: bool,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            allow_empty_variables: false,
            allow_duplicates: false,
            keep_descriptions: false,
            param_order_from_yaml: true,
        }
    }
}

impl ExpansionOptions {
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            allow_empty: self.allow_empty_variables,
            preserve_order: self.param_order_from_yaml,
        }
    }
}

/// A fully substituted job, ready for XML generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedJob {
    pub name: String,
    pub data: Mapping,
}

impl RealizedJob {
    fn from_data(data: Mapping) -> Result<Self> {
        let name = data
            .get("name")
            .and_then(scalar_to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::InvalidDefinition("realized job has no name".to_string()))?;
        Ok(Self { name, data })
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.data.get(attribute)
    }
}

/// A view definition, ready for XML generation.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedView {
    pub name: String,
    pub data: Mapping,
}

/// Everything produced by one expansion pass.
#[derive(Debug, Default)]
pub struct Expansion {
    pub jobs: Vec<RealizedJob>,
    pub views: Vec<RealizedView>,
    pub warnings: Vec<Warning>,
}

type Axis = (String, Vec<Value>);

/// Expands definitions held in a [`DefinitionStore`].
///
/// Stateless between calls: every call reads the store and returns freshly
/// owned results.
pub struct Expander<'a> {
    store: &'a DefinitionStore,
    options: ExpansionOptions,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a DefinitionStore, options: ExpansionOptions) -> Self {
        Self { store, options }
    }

    /// Realize every job, project and view in the store.
    ///
    /// With a filter, only jobs whose final name matches are kept.
    pub fn expand_all(&self, filter: Option<&JobFilter>) -> Result<Expansion> {
        let mut warnings = self.store.warnings().to_vec();
        let mut jobs = Vec::new();
        let keep = |name: &str| filter.is_none_or(|f| f.matches(name));

        for job in self.store.iter(DefinitionKind::Job) {
            if !keep(&job.name) {
                debug!(job = %job.name, "ignoring job");
                continue;
            }
            debug!(job = %job.name, "expanding job");
            jobs.push(self.realize_job(job)?);
        }

        for project in self.store.iter(DefinitionKind::Project) {
            for job in self.expand_project(project, &mut warnings)? {
                if keep(&job.name) {
                    jobs.push(job);
                } else {
                    debug!(job = %job.name, "ignoring job");
                }
            }
        }

        let jobs = self.dedupe(jobs, &mut warnings)?;
        let views = self
            .store
            .iter(DefinitionKind::View)
            .map(|view| RealizedView {
                name: view.name.clone(),
                data: view.data.clone(),
            })
            .collect();

        info!(jobs = jobs.len(), warnings = warnings.len(), "expansion finished");
        Ok(Expansion {
            jobs,
            views,
            warnings,
        })
    }

    /// Realize the jobs of a single project, in combination order and, within
    /// a combination, in entry order.
    pub fn expand(&self, project: &RawDefinition) -> Result<Vec<RealizedJob>> {
        let mut warnings = Vec::new();
        let jobs = self.expand_project(project, &mut warnings)?;
        self.dedupe(jobs, &mut warnings)
    }

    /// Realize a plain job: defaults layered under it, macros resolved, no
    /// variable substitution.
    pub fn realize_job(&self, job: &RawDefinition) -> Result<RealizedJob> {
        let data = self.store.apply_defaults(job)?;
        let data = self.macro_resolver().resolve_job(data, None)?;
        self.finish(data)
    }

    fn expand_project(
        &self,
        project: &RawDefinition,
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<RealizedJob>> {
        info!(project = %project.name, "expanding project");

        let mut realized: Vec<(usize, RealizedJob)> = Vec::new();
        let mut seen = HashSet::new();
        let base = Variables::from_mapping(&project.data);

        for entry in job_entries(project)? {
            let (name, overrides) = job_entry(entry, project)?;
            let mut vars = base.clone();
            if let Some(overrides) = overrides {
                vars.extend_from_mapping(overrides);
            }
            self.realize_entry(
                project,
                name,
                vars,
                &mut Vec::new(),
                &mut seen,
                &mut realized,
                warnings,
            )?;
        }

        // Stable, so entries sharing a combination keep their list order.
        realized.sort_by_key(|(combination, _)| *combination);
        Ok(realized.into_iter().map(|(_, job)| job).collect())
    }

    #[allow(clippy::too_many_arguments)]
    fn realize_entry(
        &self,
        project: &RawDefinition,
        name: &str,
        vars: Variables,
        groups: &mut Vec<String>,
        seen: &mut HashSet<String>,
        realized: &mut Vec<(usize, RealizedJob)>,
        warnings: &mut Vec<Warning>,
    ) -> Result<()> {
        if self.store.get(DefinitionKind::Job, name).is_some() {
            // Already realized on its own; only guard against listing it twice.
            if !seen.insert(name.to_string()) {
                self.duplicate(
                    Warning::DuplicateProjectJob {
                        project: project.name.clone(),
                        job: name.to_string(),
                    },
                    Error::DuplicateDefinition {
                        kind: DefinitionKind::Job,
                        name: name.to_string(),
                    },
                    warnings,
                )?;
            }
            return Ok(());
        }

        if let Some(group) = self.store.get(DefinitionKind::JobGroup, name) {
            if groups.iter().any(|g| g == &group.name) {
                let mut chain = groups.clone();
                chain.push(group.name.clone());
                return Err(Error::GroupCycle { chain });
            }
            debug!(project = %project.name, group = %group.name, "expanding job-group");

            let mut group_vars = vars;
            group_vars.extend_from_mapping(&group.data);
            // The group's own name is of no use to its templates.
            group_vars.set("name", project.name.clone());

            groups.push(group.name.clone());
            for entry in job_entries(group)? {
                let (job_name, overrides) = job_entry(entry, group)?;
                let mut entry_vars = group_vars.clone();
                if let Some(overrides) = overrides {
                    entry_vars.extend_from_mapping(overrides);
                }
                self.realize_entry(
                    project,
                    job_name,
                    entry_vars,
                    groups,
                    seen,
                    realized,
                    warnings,
                )?;
            }
            groups.pop();
            return Ok(());
        }

        let referenced_from = match groups.last() {
            Some(group) => format!("job-group '{}' in project '{}'", group, project.name),
            None => format!("project '{}'", project.name),
        };
        let template = self
            .store
            .lookup(DefinitionKind::JobTemplate, name, &referenced_from)?;
        realized.extend(self.expand_template(template, vars, &referenced_from)?);
        Ok(())
    }

    /// Realize one job-template against a merged project binding.
    ///
    /// Each job is paired with the index of its combination in the full
    /// cartesian product.
    fn expand_template(
        &self,
        template: &RawDefinition,
        mut params: Variables,
        referenced_from: &str,
    ) -> Result<Vec<(usize, RealizedJob)>> {
        params.remove("jobs");
        let excludes = exclude_rules(params.remove("exclude"), referenced_from)?;

        // The project's selection wins over the template's own.
        let selector = params
            .resolve("defaults")
            .or_else(|| template.get("defaults"));
        let mut template_data = self.store.defaults_for(selector, referenced_from)?;
        for (key, value) in &template.data {
            template_data.insert(key.clone(), value.clone());
        }
        let axes = matrix_axes(&template.name, &params)?;

        let mut base = Variables::from_mapping(&template_data);
        base.extend(&params);
        // Escaped so the name survives interpolation untouched.
        base.set(
            TEMPLATE_NAME_VAR,
            template.name.replace('{', "{{").replace('}', "}}"),
        );

        let format_options = self.options.format_options();
        let mut jobs = Vec::new();

        for (index, combination) in cartesian_product(&axes).into_iter().enumerate() {
            let mut vars = base.clone();
            for (axis, value) in &combination {
                bind_axis_value(&mut vars, axis, value);
            }

            if is_excluded(&vars, &excludes) {
                debug!(template = %template.name, ?combination, "combination excluded");
                continue;
            }

            let data = Formatter::new(&vars, format_options).format_mapping(&template_data)?;
            let data = self.macro_resolver().resolve_job(data, Some(&vars))?;
            let job = self.finish(data)?;
            debug!(template = %template.name, job = %job.name, "realized job");
            jobs.push((index, job));
        }
        Ok(jobs)
    }

    fn macro_resolver(&self) -> MacroResolver<'a> {
        MacroResolver::new(self.store, self.options.format_options())
    }

    fn finish(&self, mut data: Mapping) -> Result<RealizedJob> {
        let description = match data.get("description") {
            Some(value) => Some(render_value(value)),
            None if self.options.keep_descriptions => None,
            None => Some(String::new()),
        };
        if let Some(description) = description {
            let description = if description.is_empty() {
                MANAGED_MARKER.to_string()
            } else {
                format!("{}\n\n{}", description, MANAGED_MARKER)
            };
            data.insert(Value::from("description"), Value::from(description));
        }
        RealizedJob::from_data(data)
    }

    /// Drop earlier jobs whose name is reused later; the last one wins.
    fn dedupe(
        &self,
        jobs: Vec<RealizedJob>,
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<RealizedJob>> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(jobs.len());

        for job in jobs.into_iter().rev() {
            if !seen.insert(job.name.clone()) {
                self.duplicate(
                    Warning::DuplicateJob {
                        name: job.name.clone(),
                    },
                    Error::DuplicateDefinition {
                        kind: DefinitionKind::Job,
                        name: job.name,
                    },
                    warnings,
                )?;
                continue;
            }
            kept.push(job);
        }
        kept.reverse();
        Ok(kept)
    }

    fn duplicate(&self, warning: Warning, err: Error, warnings: &mut Vec<Warning>) -> Result<()> {
        if self.options.allow_duplicates {
            warn!("{}", warning);
            warnings.push(warning);
            Ok(())
        } else {
            error!("{}", err);
            Err(err)
        }
    }
}

fn job_entries(definition: &RawDefinition) -> Result<&[Value]> {
    match definition.get("jobs") {
        Some(Value::Sequence(entries)) => Ok(entries),
        Some(Value::Null) | None => Ok(&[]),
        Some(_) => Err(Error::InvalidDefinition(format!(
            "'jobs' of {} '{}' must be a list",
            definition.kind, definition.name
        ))),
    }
}

/// A `jobs` entry is a name, or a single-key mapping of name to overrides.
fn job_entry<'v>(entry: &'v Value, owner: &RawDefinition) -> Result<(&'v str, Option<&'v Mapping>)> {
    let invalid = || {
        Error::InvalidDefinition(format!(
            "invalid jobs entry {:?} in {} '{}'",
            entry, owner.kind, owner.name
        ))
    };
    match entry {
        Value::String(name) => Ok((name.as_str(), None)),
        Value::Mapping(mapping) if mapping.len() == 1 => {
            let (name, overrides) = mapping.iter().next().ok_or_else(invalid)?;
            let name = name.as_str().ok_or_else(invalid)?;
            Ok((name, overrides.as_mapping()))
        }
        _ => Err(invalid()),
    }
}

/// List-valued variables referenced by the template's name, in binding order.
fn matrix_axes(template_name: &str, params: &Variables) -> Result<Vec<Axis>> {
    let referenced = referenced_variables(template_name)?;
    let mut axes = Vec::new();

    for (key, value) in params.iter() {
        let Value::Sequence(values) = value else {
            continue;
        };
        if referenced.iter().any(|r| r == key) {
            axes.push((key.clone(), values.clone()));
        } else {
            debug!(
                variable = %key,
                template = template_name,
                "variable not in template name, rejecting from job matrix expansion"
            );
        }
    }
    Ok(axes)
}

/// Every combination of axis values; the last axis varies fastest.
fn cartesian_product(axes: &[Axis]) -> Vec<Vec<(&str, &Value)>> {
    let mut combinations: Vec<Vec<(&str, &Value)>> = vec![Vec::new()];
    for (name, values) in axes {
        combinations = combinations
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    let mut combination = prefix.clone();
                    combination.push((name.as_str(), value));
                    combination
                })
            })
            .collect();
    }
    combinations
}

/// An axis value may be `{value: {extra: vars}}`, binding the key to the axis
/// and merging the nested variables.
fn bind_axis_value(vars: &mut Variables, axis: &str, value: &Value) {
    match value {
        Value::Mapping(mapping) if mapping.len() == 1 => {
            if let Some((key, nested)) = mapping.iter().next() {
                vars.set(axis, key.clone());
                if let Some(nested) = nested.as_mapping() {
                    vars.extend_from_mapping(nested);
                }
            }
        }
        _ => vars.set(axis, value.clone()),
    }
}

fn exclude_rules(value: Option<Value>, referenced_from: &str) -> Result<Vec<Mapping>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(rules)) => rules
            .into_iter()
            .map(|rule| match rule {
                Value::Mapping(rule) if rule.is_empty() => Err(Error::InvalidDefinition(format!(
                    "exclude rule in {} constrains no variables",
                    referenced_from
                ))),
                Value::Mapping(rule) => Ok(rule),
                other => Err(Error::InvalidDefinition(format!(
                    "exclude rule in {} must be a mapping, found {:?}",
                    referenced_from, other
                ))),
            })
            .collect(),
        Some(other) => Err(Error::InvalidDefinition(format!(
            "'exclude' in {} must be a list, found {:?}",
            referenced_from, other
        ))),
    }
}

/// A rule matches when every variable it names has the given value; variables
/// it does not name match anything.
fn is_excluded(vars: &Variables, rules: &[Mapping]) -> bool {
    rules.iter().any(|rule| {
        rule.iter().all(|(key, expected)| {
            scalar_to_string(key)
                .and_then(|key| vars.resolve(&key).cloned())
                .is_some_and(|bound| values_match(&bound, expected))
        })
    })
}

fn values_match(bound: &Value, expected: &Value) -> bool {
    if bound == expected {
        return true;
    }
    match (scalar_to_string(bound), scalar_to_string(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
