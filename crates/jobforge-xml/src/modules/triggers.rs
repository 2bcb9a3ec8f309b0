//! Build triggers.

use jobforge_core::MacroKind;
use serde_yaml::{Mapping, Value};

use super::{component_list, string_or_field};
use crate::XmlResult;
use crate::element::XmlElement;
use crate::registry::{Module, ModuleRegistry};

pub struct Triggers;

impl Module for Triggers {
    fn name(&self) -> &'static str {
        "triggers"
    }

    fn sequence(&self) -> u32 {
        50
    }

    fn gen_xml(&self, registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()> {
        let triggers = component_list(data, "triggers")?;
        if triggers.is_empty() {
            return Ok(());
        }
        let parent = root.push(XmlElement::new("triggers").with_attr("class", "vector"));
        for trigger in triggers {
            registry.dispatch(MacroKind::Trigger, parent, trigger)?;
        }
        Ok(())
    }
}

/// `- timed: '@midnight'`
pub fn timed(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let spec = string_or_field(data, "cron", "timed trigger")?;
    parent
        .sub_element("hudson.triggers.TimerTrigger")
        .text_element("spec", spec);
    Ok(())
}

/// `- pollscm: 'H/15 * * * *'`, or a mapping with `cron` and
/// `ignore-post-commit-hooks`.
pub fn pollscm(_registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
    let spec = string_or_field(data, "cron", "pollscm trigger")?;
    let trigger = parent.sub_element("hudson.triggers.SCMTrigger");
    trigger.text_element("spec", spec);
    if let Value::Mapping(mapping) = data {
        let ignore = super::is_true(mapping.get("ignore-post-commit-hooks"));
        trigger.text_element("ignorePostCommitHooks", super::bool_text(ignore));
    }
    Ok(())
}
