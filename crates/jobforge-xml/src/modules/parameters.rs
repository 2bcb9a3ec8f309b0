//! Build parameters.

use jobforge_core::MacroKind;
use serde_yaml::{Mapping, Value};

use super::{as_mapping, component_list, is_true, required, text};
use crate::element::XmlElement;
use crate::registry::{Module, ModuleRegistry};
use crate::{XmlError, XmlResult};

pub struct Parameters;

impl Module for Parameters {
    fn name(&self) -> &'static str {
        "parameters"
    }

    fn sequence(&self) -> u32 {
        21
    }

    fn gen_xml(&self, registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()> {
        let properties = root.child_or_insert("properties");
        let parameters = component_list(data, "parameters")?;
        if parameters.is_empty() {
            return Ok(());
        }
        let definitions = properties
            .sub_element("hudson.model.ParametersDefinitionProperty")
            .sub_element("parameterDefinitions");
        for parameter in parameters {
            registry.dispatch(MacroKind::Parameter, definitions, parameter)?;
        }
        Ok(())
    }
}

fn base_param<'p>(
    parent: &'p mut XmlElement,
    data: &Mapping,
    class: &str,
    default: Option<String>,
) -> XmlResult<&'p mut XmlElement> {
    let name = text(required(data, "name", class)?);
    let description = data.get("description").map(text).unwrap_or_default();

    let definition = parent.sub_element(class);
    definition.text_element("name", name);
    definition.text_element("description", description);
    if let Some(default) = default {
        definition.text_element("defaultValue", default);
    }
    Ok(definition)
}

/// `- string: {name: BRANCH, default: main, description: ...}`
pub fn string(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let data = as_mapping(data, "string parameter")?;
    let default = data.get("default").map(text).unwrap_or_default();
    base_param(parent, data, "hudson.model.StringParameterDefinition", Some(default))?;
    Ok(())
}

/// `- bool: {name: DEPLOY, default: false}`
pub fn boolean(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let data = as_mapping(data, "bool parameter")?;
    let default = super::bool_text(is_true(data.get("default"))).to_string();
    base_param(parent, data, "hudson.model.BooleanParameterDefinition", Some(default))?;
    Ok(())
}

/// `- choice: {name: ENV, choices: [dev, prod]}`
pub fn choice(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let data = as_mapping(data, "choice parameter")?;
    let choices = match required(data, "choices", "choice parameter")? {
        Value::Sequence(choices) => choices,
        other => {
            return Err(XmlError::InvalidValue {
                field: "choices".to_string(),
                context: "choice parameter".to_string(),
                message: format!("expected a list, found {:?}", other),
            });
        }
    };

    let definition = base_param(parent, data, "hudson.model.ChoiceParameterDefinition", None)?;
    let array = definition
        .push(XmlElement::new("choices").with_attr("class", "java.util.Arrays$ArrayList"))
        .push(XmlElement::new("a").with_attr("class", "string-array"));
    for choice in choices {
        array.text_element("string", text(choice));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(src: &str) -> XmlElement {
        let data: Mapping = serde_yaml::from_str(src).unwrap();
        let mut root = XmlElement::new("project");
        Parameters
            .gen_xml(&ModuleRegistry::with_core(), &mut root, &data)
            .unwrap();
        root
    }

    #[test]
    fn test_properties_always_present() {
        let root = generate("{name: j}");
        assert!(root.child("properties").unwrap().children.is_empty());
    }

    #[test]
    fn test_parameter_definitions() {
        let root = generate(
            r#"
parameters:
  - string: {name: BRANCH, default: main, description: Branch to build}
  - bool: {name: DEPLOY, default: true}
  - choice: {name: ENV, choices: [dev, prod]}
"#,
        );
        let definitions = root
            .child("properties")
            .and_then(|p| p.child("hudson.model.ParametersDefinitionProperty"))
            .and_then(|p| p.child("parameterDefinitions"))
            .unwrap();
        assert_eq!(definitions.children.len(), 3);

        let string = &definitions.children[0];
        assert_eq!(string.child("defaultValue").unwrap().text.as_deref(), Some("main"));

        let boolean = &definitions.children[1];
        assert_eq!(boolean.name, "hudson.model.BooleanParameterDefinition");
        assert_eq!(boolean.child("defaultValue").unwrap().text.as_deref(), Some("true"));
        assert_eq!(boolean.child("description").unwrap().text.as_deref(), Some(""));

        let choice = &definitions.children[2];
        assert!(choice.child("defaultValue").is_none());
        let strings = &choice.child("choices").unwrap().children[0].children;
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[1].text.as_deref(), Some("prod"));
    }

    #[test]
    fn test_parameter_requires_name() {
        let data: Value = serde_yaml::from_str("{default: x}").unwrap();
        let mut parent = XmlElement::new("parameterDefinitions");
        let err = string(&ModuleRegistry::empty(), &mut parent, &data).unwrap_err();
        assert!(matches!(err, XmlError::MissingField { ref field, .. } if field == "name"));
    }
}
