//! Namespaced storage for raw definitions.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use tracing::{debug, error, warn};

use crate::definition::{DefinitionKind, MacroKind, RawDefinition, scalar_to_string};
use crate::{Error, Result, Warning};

/// Name of the defaults set applied when a definition names none.
pub const GLOBAL_DEFAULTS: &str = "global";

/// Holds every ingested definition, one ordered namespace per kind.
///
/// Ingestion requires `&mut self`; expansion only ever borrows the store
/// immutably, so a fully loaded store can be shared across threads.
#[derive(Debug, Default)]
pub struct DefinitionStore {
    allow_duplicates: bool,
    namespaces: HashMap<DefinitionKind, IndexMap<String, RawDefinition>>,
    warnings: Vec<Warning>,
}

impl DefinitionStore {
    pub fn new(allow_duplicates: bool) -> Self {
        Self {
            allow_duplicates,
            ..Default::default()
        }
    }

    /// Insert definitions in order.
    pub fn ingest(&mut self, definitions: impl IntoIterator<Item = RawDefinition>) -> Result<()> {
        for definition in definitions {
            self.insert(definition)?;
        }
        Ok(())
    }

    /// Insert one definition under its id (or name).
    ///
    /// A clash fails with [`Error::DuplicateDefinition`] unless duplicates
    /// are allowed, in which case the later definition wins.
    pub fn insert(&mut self, definition: RawDefinition) -> Result<()> {
        let kind = definition.kind;
        let key = definition.key().to_string();
        debug!(%kind, name = %key, "registering definition");

        let namespace = self.namespaces.entry(kind).or_default();
        if namespace.contains_key(&key) {
            if !self.allow_duplicates {
                error!(%kind, name = %key, "duplicate definition");
                return Err(Error::DuplicateDefinition { kind, name: key });
            }
            warn!(%kind, name = %key, "duplicate definition overrides an earlier one");
            self.warnings.push(Warning::DuplicateDefinition {
                kind,
                name: key.clone(),
            });
        }
        namespace.insert(key, definition);
        Ok(())
    }

    /// Look up by id or name.
    pub fn get(&self, kind: DefinitionKind, name_or_id: &str) -> Option<&RawDefinition> {
        let namespace = self.namespaces.get(&kind)?;
        namespace
            .get(name_or_id)
            .or_else(|| namespace.values().find(|def| def.name == name_or_id))
    }

    /// Look up by id or name, failing with [`Error::UnknownReference`].
    pub fn lookup(
        &self,
        kind: DefinitionKind,
        name_or_id: &str,
        referenced_from: &str,
    ) -> Result<&RawDefinition> {
        self.get(kind, name_or_id)
            .ok_or_else(|| Error::UnknownReference {
                kind,
                name: name_or_id.to_string(),
                referenced_from: referenced_from.to_string(),
            })
    }

    /// All definitions of a kind, in ingestion order.
    pub fn iter(&self, kind: DefinitionKind) -> impl Iterator<Item = &RawDefinition> {
        self.namespaces
            .get(&kind)
            .into_iter()
            .flat_map(|namespace| namespace.values())
    }

    pub fn macro_definition(&self, kind: MacroKind, name: &str) -> Option<&RawDefinition> {
        self.get(DefinitionKind::Macro(kind), name)
    }

    pub fn has_macros(&self, kind: MacroKind) -> bool {
        self.namespaces
            .get(&DefinitionKind::Macro(kind))
            .is_some_and(|namespace| !namespace.is_empty())
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Resolve a `defaults:` selector into the attributes it provides.
    ///
    /// - absent: the `global` set, if defined
    /// - null: no defaults at all
    /// - a name: `global` with the named set layered on top
    pub fn defaults_for(&self, selector: Option<&Value>, referenced_from: &str) -> Result<Mapping> {
        let named = match selector {
            Some(Value::Null) => return Ok(Mapping::new()),
            Some(value) => scalar_to_string(value).ok_or_else(|| {
                Error::InvalidDefinition(format!(
                    "'defaults' of {} must be a name, found {:?}",
                    referenced_from, value
                ))
            })?,
            None => GLOBAL_DEFAULTS.to_string(),
        };

        let mut merged = self
            .get(DefinitionKind::Defaults, GLOBAL_DEFAULTS)
            .map(|global| strip_identity(&global.data))
            .unwrap_or_default();

        if named != GLOBAL_DEFAULTS {
            let set = self.lookup(DefinitionKind::Defaults, &named, referenced_from)?;
            for (key, value) in strip_identity(&set.data) {
                merged.insert(key, value);
            }
        }
        Ok(merged)
    }

    /// The definition's attributes layered over the defaults it selects.
    pub fn apply_defaults(&self, definition: &RawDefinition) -> Result<Mapping> {
        let referenced_from = format!("{} '{}'", definition.kind, definition.name);
        let mut data = self.defaults_for(definition.get("defaults"), &referenced_from)?;
        for (key, value) in &definition.data {
            data.insert(key.clone(), value.clone());
        }
        Ok(data)
    }
}

/// A defaults body without its own `name`/`id`, which must never leak into jobs.
fn strip_identity(data: &Mapping) -> Mapping {
    data.iter()
        .filter(|(key, _)| !matches!(key.as_str(), Some("name") | Some("id")))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::parse_document;

    fn store_from(src: &str, allow_duplicates: bool) -> Result<DefinitionStore> {
        let doc: Value = serde_yaml::from_str(src).unwrap();
        let mut store = DefinitionStore::new(allow_duplicates);
        store.ingest(parse_document(&doc)?)?;
        Ok(store)
    }

    #[test]
    fn test_duplicate_fails_by_default() {
        let src = r#"
- job: {name: a, description: first}
- job: {name: a, description: second}
"#;
        let err = store_from(src, false).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateDefinition { kind: DefinitionKind::Job, ref name } if name == "a"
        ));
    }

    #[test]
    fn test_duplicate_tolerated_last_wins() {
        let src = r#"
- job: {name: a, description: first}
- job: {name: a, description: second}
"#;
        let store = store_from(src, true).unwrap();
        let job = store.get(DefinitionKind::Job, "a").unwrap();
        assert_eq!(job.get("description"), Some(&Value::from("second")));
        assert_eq!(store.warnings().len(), 1);
    }

    #[test]
    fn test_namespaces_are_separate() {
        let src = r#"
- job: {name: shared}
- job-template: {name: shared}
- builder: {name: shared, builders: []}
"#;
        let store = store_from(src, false).unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.has_macros(MacroKind::Builder));
        assert!(!store.has_macros(MacroKind::Publisher));
    }

    #[test]
    fn test_lookup_by_id_or_name() {
        let src = r#"
- job-template: {name: '{name}-unit', id: unit}
"#;
        let store = store_from(src, false).unwrap();
        assert!(store.get(DefinitionKind::JobTemplate, "unit").is_some());
        assert!(store.get(DefinitionKind::JobTemplate, "{name}-unit").is_some());

        let err = store
            .lookup(DefinitionKind::JobTemplate, "nope", "project 'p'")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown job-template 'nope' referenced from project 'p'"
        );
    }

    #[test]
    fn test_global_defaults_apply_unless_overridden() {
        let src = r#"
- defaults: {name: global, description: X, node: linux}
- job: {name: plain}
- job: {name: own, description: mine}
"#;
        let store = store_from(src, false).unwrap();

        let plain = store
            .apply_defaults(store.get(DefinitionKind::Job, "plain").unwrap())
            .unwrap();
        assert_eq!(plain.get("description"), Some(&Value::from("X")));
        assert_eq!(plain.get("name"), Some(&Value::from("plain")));

        let own = store
            .apply_defaults(store.get(DefinitionKind::Job, "own").unwrap())
            .unwrap();
        assert_eq!(own.get("description"), Some(&Value::from("mine")));
        assert_eq!(own.get("node"), Some(&Value::from("linux")));
    }

    #[test]
    fn test_named_defaults_layer_over_global() {
        let src = r#"
- defaults: {name: global, description: X, node: linux}
- defaults: {name: windows, node: win}
- job: {name: j, defaults: windows}
"#;
        let store = store_from(src, false).unwrap();
        let job = store
            .apply_defaults(store.get(DefinitionKind::Job, "j").unwrap())
            .unwrap();
        assert_eq!(job.get("node"), Some(&Value::from("win")));
        assert_eq!(job.get("description"), Some(&Value::from("X")));
    }

    #[test]
    fn test_null_defaults_disable_inheritance() {
        let src = r#"
- defaults: {name: global, description: X}
- job: {name: j, defaults: ~}
"#;
        let store = store_from(src, false).unwrap();
        let job = store
            .apply_defaults(store.get(DefinitionKind::Job, "j").unwrap())
            .unwrap();
        assert!(job.get("description").is_none());
    }

    #[test]
    fn test_unknown_named_defaults() {
        let src = "- job: {name: j, defaults: missing}";
        let store = store_from(src, false).unwrap();
        let err = store
            .apply_defaults(store.get(DefinitionKind::Job, "j").unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownReference { kind: DefinitionKind::Defaults, .. }
        ));
    }
}
