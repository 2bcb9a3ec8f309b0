//! Settings file parsing.
//!
//! Settings live in a KDL document with two optional sections:
//!
//! ```kdl
//! job-builder {
//!     allow-duplicates #false
//!     keep-descriptions #true
//!     include-path "scripts" "/opt/jobs/shared"
//!     exclude ".git" "archive"
//! }
//! jenkins {
//!     url "https://jenkins.example.com/"
//!     user "deploy"
//!     password "s3cret"
//!     timeout 30
//! }
//! ```

use crate::{ConfigError, ConfigResult};
use jobforge_core::ExpansionOptions;
use kdl::{KdlDocument, KdlNode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_JENKINS_URL: &str = "http://localhost:8080/";
pub const LOCAL_CONFIG_FILE: &str = "jobforge.kdl";
pub const SYSTEM_CONFIG_FILE: &str = "/etc/jobforge/config.kdl";

/// Options of the `job-builder` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobBuilderSettings {
    pub allow_duplicates: bool,
    pub allow_empty_variables: bool,
    pub keep_descriptions: bool,
    pub param_order_from_yaml: bool,
    pub ignore_cache: bool,
    pub recursive: bool,
    pub exclude: Vec<String>,
    pub include_path: Vec<PathBuf>,
}

impl Default for JobBuilderSettings {
    fn default() -> Self {
        Self {
            allow_duplicates: false,
            allow_empty_variables: false,
            keep_descriptions: false,
            param_order_from_yaml: true,
            ignore_cache: false,
            recursive: false,
            exclude: Vec::new(),
            include_path: vec![PathBuf::from(".")],
        }
    }
}

/// Options of the `jenkins` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JenkinsSettings {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for JenkinsSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_JENKINS_URL.to_string(),
            user: None,
            password: None,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub job_builder: JobBuilderSettings,
    pub jenkins: JenkinsSettings,
    /// File the settings were read from, if any.
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Parse settings from KDL text. Unknown nodes are ignored.
    pub fn parse(kdl: &str) -> ConfigResult<Self> {
        let doc: KdlDocument = kdl.parse()?;
        let mut settings = Settings::default();

        for node in doc.nodes() {
            match node.name().value() {
                "job-builder" => parse_job_builder(node, &mut settings.job_builder)?,
                "jenkins" => parse_jenkins(node, &mut settings.jenkins)?,
                _ => {}
            }
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let mut settings = Self::parse(&text)?;
        settings.source = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Load the first settings file found, or built-in defaults.
    ///
    /// An explicitly requested file must exist.
    pub fn discover(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        for candidate in search_paths() {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "reading settings");
                return Self::load(&candidate);
            }
        }
        debug!("no settings file found, using defaults");
        Ok(Self::default())
    }

    pub fn expansion_options(&self) -> ExpansionOptions {
        ExpansionOptions {
            allow_empty_variables: self.job_builder.allow_empty_variables,
            allow_duplicates: self.job_builder.allow_duplicates,
            keep_descriptions: self.job_builder.keep_descriptions,
            param_order_from_yaml: self.job_builder.param_order_from_yaml,
        }
    }
}

/// Candidate settings files, most specific first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    let config_home = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
    if let Some(dir) = config_home {
        paths.push(dir.join("jobforge").join("config.kdl"));
    }
    paths.push(PathBuf::from(SYSTEM_CONFIG_FILE));
    paths
}

fn parse_job_builder(node: &KdlNode, settings: &mut JobBuilderSettings) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        let field = child.name().value();
        match field {
            "allow-duplicates" => settings.allow_duplicates = get_bool_arg(child, field)?,
            "allow-empty-variables" => settings.allow_empty_variables = get_bool_arg(child, field)?,
            "keep-descriptions" => settings.keep_descriptions = get_bool_arg(child, field)?,
            "param-order-from-yaml" => settings.param_order_from_yaml = get_bool_arg(child, field)?,
            "ignore-cache" => settings.ignore_cache = get_bool_arg(child, field)?,
            "recursive" => settings.recursive = get_bool_arg(child, field)?,
            "exclude" => settings.exclude = get_all_string_args(child),
            "include-path" => {
                settings.include_path = get_all_string_args(child)
                    .into_iter()
                    .map(PathBuf::from)
                    .collect();
            }
            _ => debug!(field, "ignoring unknown job-builder setting"),
        }
    }
    Ok(())
}

fn parse_jenkins(node: &KdlNode, settings: &mut JenkinsSettings) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        match child.name().value() {
            "url" => {
                settings.url = get_first_string_arg(child)
                    .ok_or_else(|| invalid("jenkins url", "expected a string"))?;
            }
            "user" => settings.user = get_first_string_arg(child),
            "password" => settings.password = get_first_string_arg(child),
            "timeout" => {
                let seconds = child
                    .entries()
                    .iter()
                    .find(|e| e.name().is_none())
                    .and_then(|e| e.value().as_integer())
                    .and_then(|secs| u64::try_from(secs).ok())
                    .ok_or_else(|| invalid("jenkins timeout", "expected a positive number of seconds"))?;
                settings.timeout = Some(Duration::from_secs(seconds));
            }
            other => debug!(field = other, "ignoring unknown jenkins setting"),
        }
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

/// A bare node name means `true`; otherwise the first argument must be a boolean.
fn get_bool_arg(node: &KdlNode, field: &str) -> ConfigResult<bool> {
    let Some(entry) = node.entries().iter().find(|e| e.name().is_none()) else {
        return Ok(true);
    };
    let value = entry.value();
    value
        .as_bool()
        .or_else(|| match value.as_string() {
            Some("true" | "yes") => Some(true),
            Some("false" | "no") => Some(false),
            _ => None,
        })
        .ok_or_else(|| invalid(field, &format!("expected a boolean, found {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file_content() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.jenkins.url, DEFAULT_JENKINS_URL);
        assert!(settings.job_builder.param_order_from_yaml);
    }

    #[test]
    fn test_parse_full_settings() {
        let kdl = r#"
            job-builder {
                allow-duplicates #true
                allow-empty-variables
                keep-descriptions "yes"
                param-order-from-yaml #false
                include-path "scripts" "/opt/shared"
                exclude ".git" "old-*"
            }
            jenkins {
                url "https://ci.example.com/"
                user "deploy"
                password "hunter2"
                timeout 45
            }
        "#;

        let settings = Settings::parse(kdl).unwrap();
        let jb = &settings.job_builder;
        assert!(jb.allow_duplicates);
        assert!(jb.allow_empty_variables);
        assert!(jb.keep_descriptions);
        assert!(!jb.param_order_from_yaml);
        assert!(!jb.recursive);
        assert_eq!(
            jb.include_path,
            vec![PathBuf::from("scripts"), PathBuf::from("/opt/shared")]
        );
        assert_eq!(jb.exclude, vec![".git", "old-*"]);

        assert_eq!(settings.jenkins.url, "https://ci.example.com/");
        assert_eq!(settings.jenkins.user.as_deref(), Some("deploy"));
        assert_eq!(settings.jenkins.password.as_deref(), Some("hunter2"));
        assert_eq!(settings.jenkins.timeout, Some(Duration::from_secs(45)));

        let options = settings.expansion_options();
        assert!(options.allow_duplicates);
        assert!(!options.param_order_from_yaml);
    }

    #[test]
    fn test_invalid_boolean() {
        let err = Settings::parse("job-builder { recursive \"maybe\" }").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "recursive"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = Settings::parse("jenkins { timeout \"soon\" }").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_load_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "jenkins { url \"http://ci:8080/\" }").unwrap();

        let settings = Settings::discover(Some(&path)).unwrap();
        assert_eq!(settings.source.as_deref(), Some(path.as_path()));
        assert_eq!(settings.jenkins.url, "http://ci:8080/");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::discover(Some(&dir.path().join("nope.kdl"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
