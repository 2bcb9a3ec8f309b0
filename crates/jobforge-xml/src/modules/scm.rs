//! Source control.
//!
//! No source control components are built in; a job without `scm` entries
//! gets Jenkins' null SCM.

use jobforge_core::MacroKind;
use serde_yaml::Mapping;

use super::component_list;
use crate::XmlResult;
use crate::element::XmlElement;
use crate::registry::{Module, ModuleRegistry};

pub struct Scm;

impl Module for Scm {
    fn name(&self) -> &'static str {
        "scm"
    }

    fn sequence(&self) -> u32 {
        30
    }

    fn gen_xml(&self, registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()> {
        let scms = component_list(data, "scm")?;
        if scms.is_empty() {
            root.push(XmlElement::new("scm").with_attr("class", "hudson.scm.NullSCM"));
            return Ok(());
        }
        for scm in scms {
            registry.dispatch(MacroKind::Scm, root, scm)?;
        }
        Ok(())
    }
}
