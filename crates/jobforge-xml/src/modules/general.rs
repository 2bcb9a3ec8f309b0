//! General job settings that are not part of any component list.

use serde_yaml::{Mapping, Value};

use super::{as_mapping, bool_text, is_true, text};
use crate::XmlResult;
use crate::element::XmlElement;
use crate::registry::{Module, ModuleRegistry};

pub struct General;

impl Module for General {
    fn name(&self) -> &'static str {
        "general"
    }

    fn sequence(&self) -> u32 {
        10
    }

    fn gen_xml(&self, _registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()> {
        if let Some(jdk) = data.get("jdk").filter(|v| !v.is_null()) {
            root.text_element("jdk", text(jdk));
        }
        root.sub_element("actions");
        root.text_element(
            "description",
            data.get("description").map(text).unwrap_or_default(),
        );
        if let Some(display_name) = data.get("display-name").filter(|v| !v.is_null()) {
            root.text_element("displayName", text(display_name));
        }
        root.text_element("keepDependencies", "false");

        let flags = [
            ("disabled", "disabled"),
            ("block-downstream", "blockBuildWhenDownstreamBuilding"),
            ("block-upstream", "blockBuildWhenUpstreamBuilding"),
            ("concurrent", "concurrentBuild"),
        ];
        for (field, element) in flags {
            root.text_element(element, bool_text(is_true(data.get(field))));
        }

        if let Some(workspace) = data.get("workspace").filter(|v| !v.is_null()) {
            root.text_element("customWorkspace", text(workspace));
        }
        if let Some(quiet_period) = data.get("quiet-period") {
            root.text_element("quietPeriod", text(quiet_period));
        }
        if let Some(node) = data.get("node").map(text).filter(|n| !n.is_empty()) {
            root.text_element("assignedNode", node);
            root.text_element("canRoam", "false");
        }

        if let Some(logrotate) = data.get("logrotate").filter(|v| !v.is_null()) {
            gen_logrotate(root, logrotate)?;
        }
        Ok(())
    }
}

fn gen_logrotate(root: &mut XmlElement, logrotate: &Value) -> XmlResult<()> {
    let logrotate = as_mapping(logrotate, "logrotate")?;
    let rotator = root.sub_element("logRotator");
    for (field, element) in [
        ("daysToKeep", "daysToKeep"),
        ("numToKeep", "numToKeep"),
        ("artifactDaysToKeep", "artifactDaysToKeep"),
        ("artifactNumToKeep", "artifactNumToKeep"),
    ] {
        let value = logrotate.get(field).map(text).unwrap_or_else(|| "-1".to_string());
        rotator.text_element(element, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(src: &str) -> XmlElement {
        let data: Mapping = serde_yaml::from_str(src).unwrap();
        let mut root = XmlElement::new("project");
        General
            .gen_xml(&ModuleRegistry::empty(), &mut root, &data)
            .unwrap();
        root
    }

    fn text_of<'e>(root: &'e XmlElement, name: &str) -> Option<&'e str> {
        root.child(name).and_then(|c| c.text.as_deref())
    }

    #[test]
    fn test_defaults() {
        let root = generate("{name: j}");
        assert_eq!(text_of(&root, "description"), Some(""));
        assert_eq!(text_of(&root, "disabled"), Some("false"));
        assert_eq!(text_of(&root, "concurrentBuild"), Some("false"));
        assert!(root.child("assignedNode").is_none());
        assert!(root.child("canRoam").is_none());
        assert!(root.child("jdk").is_none());
    }

    #[test]
    fn test_all_fields() {
        let root = generate(
            r#"
name: j
description: hello
display-name: Nice Name
disabled: 'true'
concurrent: true
quiet-period: 5
workspace: /srv/ws
node: linux
jdk: jdk17
logrotate: {daysToKeep: 3, numToKeep: 20}
"#,
        );
        assert_eq!(root.children[0].name, "jdk");
        assert_eq!(text_of(&root, "description"), Some("hello"));
        assert_eq!(text_of(&root, "displayName"), Some("Nice Name"));
        assert_eq!(text_of(&root, "disabled"), Some("true"));
        assert_eq!(text_of(&root, "concurrentBuild"), Some("true"));
        assert_eq!(text_of(&root, "quietPeriod"), Some("5"));
        assert_eq!(text_of(&root, "customWorkspace"), Some("/srv/ws"));
        assert_eq!(text_of(&root, "assignedNode"), Some("linux"));
        assert_eq!(text_of(&root, "canRoam"), Some("false"));

        let rotator = root.child("logRotator").unwrap();
        assert_eq!(text_of(rotator, "daysToKeep"), Some("3"));
        assert_eq!(text_of(rotator, "artifactNumToKeep"), Some("-1"));
    }
}
