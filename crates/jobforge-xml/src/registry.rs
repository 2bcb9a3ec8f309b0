//! Module and component registry.
//!
//! Modules contribute top-level sections of a job's XML, in sequence order.
//! Components are the individual entries of component lists (`builders`,
//! `publishers`, ...) and are looked up by kind and name. Everything is
//! registered from static tables; nothing is discovered at runtime.

use indexmap::IndexMap;
use jobforge_core::MacroKind;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::element::XmlElement;
use crate::modules::{self, builders, parameters, publishers, triggers};
use crate::views;
use crate::{XmlError, XmlResult};

/// Generates the XML for one component list entry.
pub trait Component: Send + Sync {
    fn generate(&self, registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()>;
}

pub type ComponentFn = fn(&ModuleRegistry, &mut XmlElement, &Value) -> XmlResult<()>;

impl Component for ComponentFn {
    fn generate(&self, registry: &ModuleRegistry, parent: &mut XmlElement, data: &Value) -> XmlResult<()> {
        self(registry, parent, data)
    }
}

/// Contributes a section of a job's XML.
pub trait Module: Send + Sync {
    fn name(&self) -> &'static str;

    /// Modules run in ascending sequence order.
    fn sequence(&self) -> u32;

    fn gen_xml(&self, registry: &ModuleRegistry, root: &mut XmlElement, data: &Mapping) -> XmlResult<()>;
}

/// Builds the root element for a project or view type.
pub type RootFn = fn(&Mapping) -> XmlResult<XmlElement>;

static CORE_COMPONENTS: &[(MacroKind, &str, ComponentFn)] = &[
    (MacroKind::Builder, "shell", builders::shell),
    (MacroKind::Builder, "batch", builders::batch),
    (MacroKind::Publisher, "archive", publishers::archive),
    (MacroKind::Trigger, "timed", triggers::timed),
    (MacroKind::Trigger, "pollscm", triggers::pollscm),
    (MacroKind::Parameter, "string", parameters::string),
    (MacroKind::Parameter, "bool", parameters::boolean),
    (MacroKind::Parameter, "choice", parameters::choice),
];

static CORE_PROJECT_TYPES: &[(&str, RootFn)] = &[("freestyle", modules::freestyle_root)];

static CORE_VIEW_TYPES: &[(&str, RootFn)] = &[("list", views::list_root), ("all", views::all_root)];

pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
    components: HashMap<MacroKind, IndexMap<String, Box<dyn Component>>>,
    project_types: IndexMap<&'static str, RootFn>,
    view_types: IndexMap<&'static str, RootFn>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_core()
    }
}

impl ModuleRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            modules: Vec::new(),
            components: HashMap::new(),
            project_types: IndexMap::new(),
            view_types: IndexMap::new(),
        }
    }

    /// A registry holding the built-in modules and components.
    pub fn with_core() -> Self {
        let mut registry = Self::empty();
        for module in modules::core_modules() {
            registry.register_module(module);
        }
        for &(kind, name, component) in CORE_COMPONENTS {
            registry.register_component(kind, name, Box::new(component));
        }
        registry.project_types.extend(CORE_PROJECT_TYPES.iter().copied());
        registry.view_types.extend(CORE_VIEW_TYPES.iter().copied());
        registry
    }

    pub fn register_module(&mut self, module: Box<dyn Module>) {
        debug!(module = module.name(), sequence = module.sequence(), "registering module");
        self.modules.push(module);
        self.modules.sort_by_key(|m| m.sequence());
    }

    pub fn register_component(&mut self, kind: MacroKind, name: impl Into<String>, component: Box<dyn Component>) {
        self.components.entry(kind).or_default().insert(name.into(), component);
    }

    pub fn register_project_type(&mut self, name: &'static str, root: RootFn) {
        self.project_types.insert(name, root);
    }

    pub fn register_view_type(&mut self, name: &'static str, root: RootFn) {
        self.view_types.insert(name, root);
    }

    /// Modules in sequence order.
    pub fn modules(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn has_component(&self, kind: MacroKind, name: &str) -> bool {
        self.components
            .get(&kind)
            .is_some_and(|components| components.contains_key(name))
    }

    /// Generate XML for one component list entry under `parent`.
    ///
    /// The entry is either a bare component name or a single-key mapping of
    /// name to the component's data.
    pub fn dispatch(&self, kind: MacroKind, parent: &mut XmlElement, entry: &Value) -> XmlResult<()> {
        let (name, data) = match entry {
            Value::String(name) => (name.as_str(), &Value::Null),
            Value::Mapping(mapping) if mapping.len() == 1 => match mapping.iter().next() {
                Some((Value::String(name), data)) => (name.as_str(), data),
                _ => return Err(invalid_entry(kind, entry)),
            },
            _ => return Err(invalid_entry(kind, entry)),
        };

        let components = self
            .components
            .get(&kind)
            .ok_or(XmlError::UnknownComponentType(kind))?;
        let component = components.get(name).ok_or_else(|| XmlError::UnknownComponent {
            kind,
            name: name.to_string(),
        })?;
        component.generate(self, parent, data)
    }

    pub fn project_root(&self, project_type: &str, data: &Mapping) -> XmlResult<XmlElement> {
        let root = lookup_type(&self.project_types, "project-type", project_type)?;
        root(data)
    }

    pub fn view_root(&self, view_type: &str, data: &Mapping) -> XmlResult<XmlElement> {
        let root = lookup_type(&self.view_types, "view-type", view_type)?;
        root(data)
    }
}

fn lookup_type(types: &IndexMap<&'static str, RootFn>, attribute: &'static str, value: &str) -> XmlResult<RootFn> {
    types.get(value).copied().ok_or_else(|| XmlError::UnknownType {
        attribute,
        value: value.to_string(),
        supported: types.keys().copied().collect::<Vec<_>>().join(", "),
    })
}

fn invalid_entry(kind: MacroKind, entry: &Value) -> XmlError {
    XmlError::InvalidValue {
        field: kind.list_attribute().to_string(),
        context: format!("{} entry", kind),
        message: format!("expected a name or a single-key mapping, found {:?}", entry),
    }
}
