//! Build environment wrappers.

use jobforge_core::MacroKind;
use serde_yaml::Mapping;

use super::component_list;
use crate::XmlResult;
use crate::element::XmlElement;
use crate::registry::{Module, ModuleRegistry};

pub struct Wrappers;

impl Module for Wrappers {
    fn name(&self) -> &'static str {
        "wrappers"
    }

    fn sequence(&self) -> u32 {
        80
    }

    fn gen_xml(&self, registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()> {
        let wrappers = root.sub_element("buildWrappers");
        for wrapper in component_list(data, "wrappers")? {
            registry.dispatch(MacroKind::Wrapper, wrappers, wrapper)?;
        }
        Ok(())
    }
}
