//! Post-build actions.

use jobforge_core::MacroKind;
use serde_yaml::{Mapping, Value};

use super::{as_mapping, bool_text, component_list, is_true, required, text};
use crate::XmlResult;
use crate::element::XmlElement;
use crate::registry::{Module, ModuleRegistry};

pub struct Publishers;

impl Module for Publishers {
    fn name(&self) -> &'static str {
        "publishers"
    }

    fn sequence(&self) -> u32 {
        70
    }

    fn gen_xml(&self, registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()> {
        let publishers = root.sub_element("publishers");
        for publisher in component_list(data, "publishers")? {
            registry.dispatch(MacroKind::Publisher, publishers, publisher)?;
        }
        Ok(())
    }
}

/// Archive build artifacts.
///
/// ```yaml
/// - archive:
///     artifacts: '*.tar.gz'
///     excludes: 'tmp/**'
///     latest-only: false
/// ```
pub fn archive(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let data = as_mapping(data, "archive publisher")?;
    let archiver = parent.sub_element("hudson.tasks.ArtifactArchiver");
    archiver.text_element("artifacts", text(required(data, "artifacts", "archive publisher")?));
    if let Some(excludes) = data.get("excludes") {
        archiver.text_element("excludes", text(excludes));
    }
    let latest_only = data.get("latest-only").or_else(|| data.get("latest_only"));
    archiver.text_element("latestOnly", bool_text(is_true(latest_only)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive() {
        let data: Value = serde_yaml::from_str("{artifacts: 'dist/*', excludes: '*.tmp'}").unwrap();
        let mut parent = XmlElement::new("publishers");
        archive(&ModuleRegistry::empty(), &mut parent, &data).unwrap();

        let archiver = &parent.children[0];
        let names: Vec<_> = archiver.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["artifacts", "excludes", "latestOnly"]);
        assert_eq!(archiver.children[2].text.as_deref(), Some("false"));
    }

    #[test]
    fn test_archive_requires_artifacts() {
        let data: Value = serde_yaml::from_str("{excludes: x}").unwrap();
        let mut parent = XmlElement::new("publishers");
        assert!(archive(&ModuleRegistry::empty(), &mut parent, &data).is_err());
    }

    #[test]
    fn test_empty_publishers_section() {
        let mut root = XmlElement::new("project");
        Publishers
            .gen_xml(&ModuleRegistry::with_core(), &mut root, &Mapping::new())
            .unwrap();
        assert!(root.child("publishers").unwrap().children.is_empty());
    }
}
