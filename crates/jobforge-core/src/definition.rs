//! Raw definitions as parsed from YAML sources.
//!
//! Every top-level item in a definition file is a single-key mapping whose key
//! names the kind of definition and whose value is its body:
//!
//! ```yaml
//! - job-template:
//!     name: '{name}-unit-tests'
//!     builders:
//!       - shell: tox -e {pyver}
//! - builder:
//!     name: run-tests
//!     builders:
//!       - shell: ./run-tests.sh
//! ```

use derive_more::Display;
use serde_yaml::{Mapping, Value};
use std::str::FromStr;

use crate::{Error, Result};

/// Kinds of reusable action-list fragments that can be referenced by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum MacroKind {
    #[display("builder")]
    Builder,
    #[display("publisher")]
    Publisher,
    #[display("wrapper")]
    Wrapper,
    #[display("trigger")]
    Trigger,
    #[display("scm")]
    Scm,
    #[display("property")]
    Property,
    #[display("parameter")]
    Parameter,
    #[display("reporter")]
    Reporter,
    #[display("notification")]
    Notification,
}

impl MacroKind {
    pub const ALL: [MacroKind; 9] = [
        MacroKind::Parameter,
        MacroKind::Property,
        MacroKind::Scm,
        MacroKind::Trigger,
        MacroKind::Wrapper,
        MacroKind::Builder,
        MacroKind::Publisher,
        MacroKind::Reporter,
        MacroKind::Notification,
    ];

    /// The job attribute holding a list of components of this kind.
    pub fn list_attribute(self) -> &'static str {
        match self {
            MacroKind::Builder => "builders",
            MacroKind::Publisher => "publishers",
            MacroKind::Wrapper => "wrappers",
            MacroKind::Trigger => "triggers",
            MacroKind::Scm => "scm",
            MacroKind::Property => "properties",
            MacroKind::Parameter => "parameters",
            MacroKind::Reporter => "reporters",
            MacroKind::Notification => "notifications",
        }
    }
}

/// The tag of a raw definition. Each kind is a separate name namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum DefinitionKind {
    #[display("job")]
    Job,
    #[display("job-template")]
    JobTemplate,
    #[display("job-group")]
    JobGroup,
    #[display("project")]
    Project,
    #[display("defaults")]
    Defaults,
    #[display("view")]
    View,
    #[display("{_0}")]
    Macro(MacroKind),
}

impl FromStr for DefinitionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s {
            "job" => DefinitionKind::Job,
            "job-template" => DefinitionKind::JobTemplate,
            "job-group" => DefinitionKind::JobGroup,
            "project" => DefinitionKind::Project,
            "defaults" => DefinitionKind::Defaults,
            "view" => DefinitionKind::View,
            "builder" => DefinitionKind::Macro(MacroKind::Builder),
            "publisher" => DefinitionKind::Macro(MacroKind::Publisher),
            "wrapper" => DefinitionKind::Macro(MacroKind::Wrapper),
            "trigger" => DefinitionKind::Macro(MacroKind::Trigger),
            "scm" => DefinitionKind::Macro(MacroKind::Scm),
            "property" => DefinitionKind::Macro(MacroKind::Property),
            "parameter" => DefinitionKind::Macro(MacroKind::Parameter),
            "reporter" => DefinitionKind::Macro(MacroKind::Reporter),
            "notification" => DefinitionKind::Macro(MacroKind::Notification),
            other => {
                return Err(Error::InvalidDefinition(format!(
                    "unknown definition kind '{}'",
                    other
                )));
            }
        };
        Ok(kind)
    }
}

/// A parsed but unexpanded definition.
///
/// Immutable once ingested into a [`DefinitionStore`](crate::DefinitionStore).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDefinition {
    pub kind: DefinitionKind,
    pub name: String,
    pub id: Option<String>,
    /// The full body, including `name` and `id`, in declaration order.
    pub data: Mapping,
}

impl RawDefinition {
    /// Build a definition from its kind and body.
    pub fn new(kind: DefinitionKind, data: Mapping) -> Result<Self> {
        let name = data
            .get("name")
            .and_then(scalar_to_string)
            .ok_or_else(|| {
                Error::InvalidDefinition(format!("{} definition is missing a 'name'", kind))
            })?;
        let id = data.get("id").and_then(scalar_to_string);

        Ok(Self {
            kind,
            name,
            id,
            data,
        })
    }

    /// Parse one top-level item (`{kind: body}`).
    pub fn from_item(item: &Value) -> Result<Self> {
        let mapping = item.as_mapping().ok_or_else(|| {
            Error::InvalidDefinition(format!("expected a single-key mapping, found {:?}", item))
        })?;

        if mapping.len() != 1 {
            let name = mapping
                .get("name")
                .and_then(scalar_to_string)
                .unwrap_or_else(|| "<unnamed>".to_string());
            return Err(Error::InvalidDefinition(format!(
                "syntax error for item named '{}'. Missing indent?",
                name
            )));
        }

        let (tag, body) = mapping.iter().next().ok_or_else(|| {
            Error::InvalidDefinition("empty definition item".to_string())
        })?;
        let tag = tag.as_str().ok_or_else(|| {
            Error::InvalidDefinition(format!("definition kind must be a string, found {:?}", tag))
        })?;
        let kind: DefinitionKind = tag.parse()?;
        let body = body.as_mapping().cloned().ok_or_else(|| {
            Error::InvalidDefinition(format!("body of {} definition must be a mapping", kind))
        })?;

        Self::new(kind, body)
    }

    /// The key this definition is stored under: its `id` if set, else its name.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.data.get(attribute)
    }
}

/// Parse a whole YAML document into definitions, preserving item order.
pub fn parse_document(document: &Value) -> Result<Vec<RawDefinition>> {
    match document {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items.iter().map(RawDefinition::from_item).collect(),
        other => Err(Error::InvalidDefinition(format!(
            "the topmost collection must be a list, not {}",
            value_type_name(other)
        ))),
    }
}

/// Render a scalar value the way it appears in substituted strings.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(src: &str) -> Value {
        serde_yaml::from_str(src).unwrap()
    }

    #[test]
    fn test_parse_document_preserves_order() {
        let doc = yaml(
            r#"
- job:
    name: first
- builder:
    name: run-tests
    builders:
      - shell: make test
- job-template:
    name: '{name}-docs'
    id: docs
"#,
        );

        let defs = parse_document(&doc).unwrap();
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].kind, DefinitionKind::Job);
        assert_eq!(defs[1].kind, DefinitionKind::Macro(MacroKind::Builder));
        assert_eq!(defs[2].key(), "docs");
        assert_eq!(defs[2].name, "{name}-docs");
    }

    #[test]
    fn test_missing_indent_is_reported() {
        let doc = yaml(
            r#"
- job:
  name: oops
"#,
        );

        let err = parse_document(&doc).unwrap_err();
        assert!(err.to_string().contains("Missing indent"));
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn test_top_level_must_be_list() {
        let doc = yaml("job: {name: x}");
        assert!(matches!(
            parse_document(&doc),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let doc = yaml("- pipeline: {name: x}");
        let err = parse_document(&doc).unwrap_err();
        assert!(err.to_string().contains("unknown definition kind 'pipeline'"));
    }

    #[test]
    fn test_kind_display_matches_yaml_tag() {
        for tag in ["job", "job-template", "job-group", "project", "defaults", "view", "scm"] {
            let kind: DefinitionKind = tag.parse().unwrap();
            assert_eq!(kind.to_string(), tag);
        }
        assert_eq!(MacroKind::Builder.list_attribute(), "builders");
    }
}
