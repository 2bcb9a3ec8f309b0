//! Built-in modules and the components they dispatch to.

pub mod builders;
pub mod general;
pub mod parameters;
pub mod publishers;
pub mod scm;
pub mod triggers;
pub mod wrappers;

use jobforge_core::formatter::render_value;
use serde_yaml::{Mapping, Value};

use crate::element::XmlElement;
use crate::registry::Module;
use crate::{XmlError, XmlResult};

pub(crate) fn core_modules() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(general::General),
        Box::new(parameters::Parameters),
        Box::new(scm::Scm),
        Box::new(triggers::Triggers),
        Box::new(builders::Builders),
        Box::new(publishers::Publishers),
        Box::new(wrappers::Wrappers),
    ]
}

/// Root element of a freestyle project.
pub fn freestyle_root(_data: &Mapping) -> XmlResult<XmlElement> {
    Ok(XmlElement::new("project"))
}

/// Truthiness of a YAML value as written in job definitions.
///
/// Substituted values arrive as strings, so `"true"` counts as true and
/// `"false"` as false.
pub(crate) fn is_true(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "on"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

pub(crate) fn bool_text(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// The value rendered as element text.
pub(crate) fn text(value: &Value) -> String {
    render_value(value)
}

pub(crate) fn as_mapping<'v>(data: &'v Value, context: &str) -> XmlResult<&'v Mapping> {
    data.as_mapping().ok_or_else(|| XmlError::InvalidValue {
        field: context.to_string(),
        context: context.to_string(),
        message: format!("expected a mapping, found {:?}", data),
    })
}

pub(crate) fn required<'v>(data: &'v Mapping, field: &str, context: &str) -> XmlResult<&'v Value> {
    data.get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| XmlError::MissingField {
            field: field.to_string(),
            context: context.to_string(),
        })
}

/// A component whose data is a single string, or a mapping holding it under `key`.
pub(crate) fn string_or_field(data: &Value, key: &str, context: &str) -> XmlResult<String> {
    match data {
        Value::Mapping(mapping) => required(mapping, key, context).map(text),
        Value::Null => Err(XmlError::MissingField {
            field: key.to_string(),
            context: context.to_string(),
        }),
        other => Ok(text(other)),
    }
}

/// The component entries of a list attribute; absent or null means none.
pub(crate) fn component_list<'v>(data: &'v Mapping, attribute: &str) -> XmlResult<&'v [Value]> {
    match data.get(attribute) {
        Some(Value::Sequence(items)) => Ok(items),
        Some(Value::Null) | None => Ok(&[]),
        Some(other) => Err(XmlError::InvalidValue {
            field: attribute.to_string(),
            context: "job".to_string(),
            message: format!("expected a list, found {:?}", other),
        }),
    }
}
