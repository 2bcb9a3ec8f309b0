//! Build steps.

use jobforge_core::MacroKind;
use serde_yaml::{Mapping, Value};

use super::{component_list, string_or_field};
use crate::XmlResult;
use crate::element::XmlElement;
use crate::registry::{Module, ModuleRegistry};

pub struct Builders;

impl Module for Builders {
    fn name(&self) -> &'static str {
        "builders"
    }

    fn sequence(&self) -> u32 {
        60
    }

    fn gen_xml(&self, registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()> {
        for attribute in ["prebuilders", "builders", "postbuilders"] {
            if !data.contains_key(attribute) {
                continue;
            }
            let builders = root.sub_element(attribute);
            for builder in component_list(data, attribute)? {
                registry.dispatch(MacroKind::Builder, builders, builder)?;
            }
        }
        Ok(())
    }
}

/// `- shell: <command>`
pub fn shell(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let command = string_or_field(data, "command", "shell builder")?;
    parent
        .sub_element("hudson.tasks.Shell")
        .text_element("command", command);
    Ok(())
}

/// `- batch: <command>` for Windows nodes.
pub fn batch(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let command = string_or_field(data, "command", "batch builder")?;
    parent
        .sub_element("hudson.tasks.BatchFile")
        .text_element("command", command);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_section() {
        let data: Mapping = serde_yaml::from_str(
            r#"
builders:
  - shell: make
  - batch:
      command: build.bat
"#,
        )
        .unwrap();
        let mut root = XmlElement::new("project");
        Builders
            .gen_xml(&ModuleRegistry::with_core(), &mut root, &data)
            .unwrap();

        let builders = root.child("builders").unwrap();
        assert_eq!(builders.children.len(), 2);
        assert_eq!(builders.children[0].name, "hudson.tasks.Shell");
        assert_eq!(
            builders.children[0].child("command").unwrap().text.as_deref(),
            Some("make")
        );
        assert_eq!(builders.children[1].name, "hudson.tasks.BatchFile");
        assert!(root.child("prebuilders").is_none());
    }

    #[test]
    fn test_shell_requires_command() {
        let mut parent = XmlElement::new("builders");
        assert!(shell(&ModuleRegistry::empty(), &mut parent, &Value::Null).is_err());
    }
}
