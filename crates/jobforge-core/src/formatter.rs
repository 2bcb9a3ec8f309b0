//! Variable interpolation for definition values.
//!
//! Supported placeholders:
//! - `{name}` - replaced by the bound value rendered as a string
//! - `{obj:name}` - when it is the whole string, replaced by the bound value
//!   with its type intact (bool, sequence, mapping)
//! - `{name|fallback}` - `fallback` when `name` is unbound
//! - `{{` and `}}` - literal braces
//!
//! Bound values are themselves interpolated before use, so a variable may
//! refer to other variables. Resolution stops with
//! [`Error::SubstitutionCycle`] on self-reference or when nesting exceeds
//! [`MAX_SUBSTITUTION_DEPTH`].

use regex::Regex;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::definition::scalar_to_string;
use crate::{Error, Result, Variables};

/// Maximum nesting of variable-in-variable resolution.
pub const MAX_SUBSTITUTION_DEPTH: usize = 32;

// Escaped braces, a placeholder, or a stray brace.
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{(obj:)?([A-Za-z0-9_-]+)(?:\|([^{}]*))?\}|[{}]").unwrap()
});

/// Knobs controlling how missing variables and mapping order are handled.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Substitute an empty string for unbound variables instead of failing.
    pub allow_empty: bool,
    /// Keep mapping keys in declaration order; otherwise sort them.
    pub preserve_order: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            allow_empty: false,
            preserve_order: true,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'t> {
    Literal(&'t str),
    Placeholder {
        key: &'t str,
        typed: bool,
        default: Option<&'t str>,
    },
}

/// Split a template into literals and placeholders.
///
/// A stray brace is only an error when the template also holds a
/// placeholder; otherwise the whole template is one literal, as written.
fn parse(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut stray = None;
    let mut has_placeholder = false;
    let mut last = 0;

    for caps in TOKEN_REGEX.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(&template[last..whole.start()]));
        }
        last = whole.end();

        match whole.as_str() {
            "{{" => segments.push(Segment::Literal("{")),
            "}}" => segments.push(Segment::Literal("}")),
            "{" | "}" => {
                stray.get_or_insert((whole.as_str(), whole.start()));
            }
            _ => {
                has_placeholder = true;
                segments.push(Segment::Placeholder {
                    key: caps.get(2).map(|m| m.as_str()).unwrap_or_default(),
                    typed: caps.get(1).is_some(),
                    default: caps.get(3).map(|m| m.as_str()),
                });
            }
        }
    }

    if last < template.len() {
        segments.push(Segment::Literal(&template[last..]));
    }

    match stray {
        Some((brace, offset)) if has_placeholder => Err(Error::MalformedTemplate {
            template: template.to_string(),
            message: format!(
                "single '{}' encountered at offset {}; use '{}' for a literal brace",
                brace,
                offset,
                brace.repeat(2)
            ),
        }),
        Some(_) => Ok(vec![Segment::Literal(template)]),
        None => Ok(segments),
    }
}

/// Names of the variables a template string refers to, in order of appearance.
pub fn referenced_variables(template: &str) -> Result<Vec<String>> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder { key, .. } => Some(key.to_string()),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// Interpolates strings and nested YAML structures against a binding.
pub struct Formatter<'a> {
    vars: &'a Variables,
    options: FormatOptions,
}

impl<'a> Formatter<'a> {
    pub fn new(vars: &'a Variables, options: FormatOptions) -> Self {
        Self { vars, options }
    }

    /// Interpolate a single template string.
    ///
    /// Returns a typed value when the template is exactly one `{obj:...}`
    /// placeholder or one placeholder bound to a sequence or mapping.
    pub fn format_str(&self, template: &str) -> Result<Value> {
        self.format_str_in(template, &mut Vec::new())
    }

    /// Interpolate every string leaf of `value`, preserving its structure.
    pub fn format_value(&self, value: &Value) -> Result<Value> {
        self.format_value_in(value, &mut Vec::new())
    }

    /// Interpolate keys and values of a mapping.
    pub fn format_mapping(&self, mapping: &Mapping) -> Result<Mapping> {
        self.format_mapping_in(mapping, &mut Vec::new())
    }

    fn format_str_in(&self, template: &str, chain: &mut Vec<String>) -> Result<Value> {
        if !template.contains(['{', '}']) {
            return Ok(Value::String(template.to_string()));
        }

        let segments = parse(template)?;

        if let [Segment::Placeholder {
            key,
            typed,
            default,
        }] = segments.as_slice()
        {
            return match self.lookup(key, chain)? {
                Some(value) if *typed || is_structure(&value) => Ok(value),
                Some(value) => Ok(Value::String(render_value(&value))),
                None => self.missing(key, *default, template).map(Value::String),
            };
        }

        let mut out = String::with_capacity(template.len());
        for segment in &segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { key, default, .. } => match self.lookup(key, chain)? {
                    Some(value) => out.push_str(&render_value(&value)),
                    None => out.push_str(&self.missing(key, *default, template)?),
                },
            }
        }
        Ok(Value::String(out))
    }

    fn format_value_in(&self, value: &Value, chain: &mut Vec<String>) -> Result<Value> {
        match value {
            Value::String(s) => self.format_str_in(s, chain),
            Value::Sequence(items) => items
                .iter()
                .map(|item| self.format_value_in(item, chain))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(mapping) => self.format_mapping_in(mapping, chain).map(Value::Mapping),
            Value::Tagged(tagged) => Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag.clone(),
                value: self.format_value_in(&tagged.value, chain)?,
            }))),
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
        }
    }

    fn format_mapping_in(&self, mapping: &Mapping, chain: &mut Vec<String>) -> Result<Mapping> {
        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let key = match key {
                Value::String(s) => Value::String(render_value(&self.format_str_in(s, chain)?)),
                other => other.clone(),
            };
            entries.push((key, self.format_value_in(value, chain)?));
        }

        if !self.options.preserve_order {
            entries.sort_by_key(|(key, _)| render_value(key));
        }
        Ok(entries.into_iter().collect())
    }

    /// Resolve a bound variable, interpolating its own value first.
    fn lookup(&self, key: &str, chain: &mut Vec<String>) -> Result<Option<Value>> {
        let Some(raw) = self.vars.resolve(key) else {
            return Ok(None);
        };

        if chain.iter().any(|k| k == key) || chain.len() >= MAX_SUBSTITUTION_DEPTH {
            let mut cycle = chain.clone();
            cycle.push(key.to_string());
            return Err(Error::SubstitutionCycle { chain: cycle });
        }

        chain.push(key.to_string());
        let resolved = self.format_value_in(raw, chain);
        chain.pop();
        resolved.map(Some)
    }

    fn missing(&self, key: &str, default: Option<&str>, template: &str) -> Result<String> {
        if let Some(default) = default {
            return Ok(default.to_string());
        }
        if self.options.allow_empty {
            debug!(key, "found uninitialized key, replaced with empty string");
            return Ok(String::new());
        }
        Err(Error::MissingVariable {
            placeholder: key.to_string(),
            context: template.to_string(),
        })
    }
}

fn is_structure(value: &Value) -> bool {
    matches!(value, Value::Sequence(_) | Value::Mapping(_))
}

/// Render any value as it would appear inside a larger string.
pub fn render_value(value: &Value) -> String {
    scalar_to_string(value).unwrap_or_else(|| serde_json::to_string(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(src: &str) -> Variables {
        let mapping: Mapping = serde_yaml::from_str(src).unwrap();
        Variables::from_mapping(&mapping)
    }

    fn strict(v: &Variables) -> Formatter<'_> {
        Formatter::new(v, FormatOptions::default())
    }

    trait Render {
        fn render(&self, template: &str) -> Result<String>;
    }

    impl Render for Formatter<'_> {
        fn render(&self, template: &str) -> Result<String> {
            self.format_str(template).map(|value| render_value(&value))
        }
    }

    #[test]
    fn test_basic_interpolation() {
        let v = vars("{name: foo, pyver: 27}");
        let result = strict(&v).render("{name}-py{pyver}").unwrap();
        assert_eq!(result, "foo-py27");
    }

    #[test]
    fn test_plain_string_unchanged() {
        let v = Variables::new();
        for input in ["", "echo hello", "a $VAR b", "path/to/file.txt"] {
            assert_eq!(strict(&v).render(input).unwrap(), input);
        }
    }

    #[test]
    fn test_escaped_braces() {
        let v = Variables::new();
        let result = strict(&v).render("echo ${{HOME}} {{}}").unwrap();
        assert_eq!(result, "echo ${HOME} {}");
    }

    #[test]
    fn test_escaped_braces_around_placeholder() {
        let v = vars("{x: 1}");
        assert_eq!(strict(&v).render("{{{x}}}").unwrap(), "{1}");
    }

    #[test]
    fn test_single_brace_is_malformed() {
        let v = vars("{x: 1}");
        let err = strict(&v).render("{x}}").unwrap_err();
        assert!(matches!(err, Error::MalformedTemplate { .. }));

        let err = strict(&v).render("echo {x} ${VAR:-x}").unwrap_err();
        assert!(matches!(err, Error::MalformedTemplate { .. }));
    }

    #[test]
    fn test_stray_braces_without_placeholders_pass_through() {
        let v = vars("{x: 1}");
        for input in ["echo ${VAR:-x}", "awk '{print $1}' f", "{{ }", "if (a) { b; }"] {
            assert_eq!(strict(&v).render(input).unwrap(), input);
            assert!(referenced_variables(input).unwrap().is_empty());
        }
    }

    #[test]
    fn test_missing_variable_fails_by_default() {
        let v = vars("{name: foo}");
        let err = strict(&v).render("{name}-{missing}").unwrap_err();
        match err {
            Error::MissingVariable {
                placeholder,
                context,
            } => {
                assert_eq!(placeholder, "missing");
                assert_eq!(context, "{name}-{missing}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_allow_empty_variables() {
        let v = vars("{name: foo}");
        let options = FormatOptions {
            allow_empty: true,
            ..Default::default()
        };
        let result = Formatter::new(&v, options).render("{name}-{missing}").unwrap();
        assert_eq!(result, "foo-");
    }

    #[test]
    fn test_default_fallback() {
        let v = vars("{branch: main}");
        let f = strict(&v);
        assert_eq!(f.render("{branch|master}").unwrap(), "main");
        assert_eq!(f.render("{node|linux}-x").unwrap(), "linux-x");
    }

    #[test]
    fn test_obj_passthrough_keeps_type() {
        let v = vars("{flag: true, items: [a, b], opts: {k: v}}");
        let f = strict(&v);

        assert_eq!(f.format_str("{obj:flag}").unwrap(), Value::Bool(true));
        assert_eq!(
            f.format_str("{obj:items}").unwrap(),
            serde_yaml::from_str::<Value>("[a, b]").unwrap()
        );
        assert_eq!(
            f.format_str("{obj:opts}").unwrap(),
            serde_yaml::from_str::<Value>("{k: v}").unwrap()
        );
        // Without obj: a scalar is stringified.
        assert_eq!(f.format_str("{flag}").unwrap(), Value::from("true"));
    }

    #[test]
    fn test_second_order_interpolation() {
        let v = vars("{name: foo, branch: stable, job-prefix: '{name}-{branch}'}");
        let result = strict(&v).render("{job-prefix}-tests").unwrap();
        assert_eq!(result, "foo-stable-tests");
    }

    #[test]
    fn test_second_order_escapes_are_not_rescanned() {
        let v = vars("{cmd: 'echo ${{HOME}}'}");
        assert_eq!(strict(&v).render("{cmd}").unwrap(), "echo ${HOME}");
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let v = vars("{a: '{b}', b: 'x{a}'}");
        let err = strict(&v).render("{a}").unwrap_err();
        match err {
            Error::SubstitutionCycle { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_structure_traversal_keeps_leaf_types() {
        let v = vars("{name: foo, num: 3}");
        let input: Value = serde_yaml::from_str(
            r#"
name: '{name}-job'
disabled: false
count: 5
'{name}-key': [ '{num}', 7 ]
"#,
        )
        .unwrap();

        let expected: Value = serde_yaml::from_str(
            r#"
name: foo-job
disabled: false
count: 5
foo-key: [ '3', 7 ]
"#,
        )
        .unwrap();

        assert_eq!(strict(&v).format_value(&input).unwrap(), expected);
    }

    #[test]
    fn test_unordered_mapping_sorts_keys() {
        let v = Variables::new();
        let options = FormatOptions {
            preserve_order: false,
            ..Default::default()
        };
        let input: Mapping = serde_yaml::from_str("{zeta: 1, alpha: 2}").unwrap();
        let out = Formatter::new(&v, options).format_mapping(&input).unwrap();
        let keys: Vec<_> = out.keys().map(render_value).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_referenced_variables() {
        let names = referenced_variables("{name}-{obj:axis}-{pyver|27}-{{lit}}").unwrap();
        assert_eq!(names, vec!["name", "axis", "pyver"]);
    }
}
