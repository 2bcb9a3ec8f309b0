//! CLI command implementations.

pub mod delete;
pub mod list;
pub mod test;
pub mod update;

use anyhow::{Context, Result};
use jobforge_config::{Loader, LoaderOptions, Settings};
use jobforge_core::{DefinitionStore, Expander, Expansion, JobFilter};
use jobforge_jenkins::{JenkinsClient, JobCache, JobUpdater, UpdateOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Flags shared by every subcommand.
#[derive(Debug, Default)]
pub struct GlobalOptions {
    pub conf: Option<PathBuf>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ignore_cache: bool,
    pub flush_cache: bool,
    pub allow_empty_variables: bool,
    pub recursive: bool,
    pub exclude: Vec<String>,
}

/// Read the settings file and apply command line overrides.
pub fn load_settings(options: &GlobalOptions) -> Result<Settings> {
    let mut settings = Settings::discover(options.conf.as_deref()).context("Failed to load settings")?;

    let job_builder = &mut settings.job_builder;
    job_builder.allow_empty_variables |= options.allow_empty_variables;
    job_builder.ignore_cache |= options.ignore_cache;
    job_builder.recursive |= options.recursive;
    job_builder.exclude.extend(options.exclude.iter().cloned());

    if options.user.is_some() {
        settings.jenkins.user = options.user.clone();
    }
    if options.password.is_some() {
        settings.jenkins.password = options.password.clone();
    }
    Ok(settings)
}

/// Load definitions from `paths` and expand them, keeping jobs matching `globs`.
pub fn expand(settings: &Settings, paths: &[PathBuf], globs: &[String]) -> Result<Expansion> {
    let loader = Loader::new(LoaderOptions::from(&settings.job_builder))?;
    let mut store = DefinitionStore::new(settings.job_builder.allow_duplicates);
    let files = loader
        .load_into(paths, &mut store)
        .context("Failed to load definitions")?;
    info!(files, definitions = store.len(), "Definitions loaded");

    let filter = if globs.is_empty() {
        None
    } else {
        Some(JobFilter::new(globs)?)
    };
    let expansion = Expander::new(&store, settings.expansion_options())
        .expand_all(filter.as_ref())
        .context("Failed to expand definitions")?;
    Ok(expansion)
}

pub fn jenkins_client(settings: &Settings) -> Result<JenkinsClient> {
    let jenkins = &settings.jenkins;
    let mut client = JenkinsClient::new(&jenkins.url)?.with_timeout(jenkins.timeout);
    if let Some(user) = &jenkins.user {
        client = client.with_credentials(user, jenkins.password.clone().unwrap_or_default());
    }
    Ok(client)
}

pub fn job_updater(settings: &Settings, options: &GlobalOptions, workers: usize) -> Result<JobUpdater> {
    let client = jenkins_client(settings)?;
    let cache = JobCache::open(&settings.jenkins.url, options.flush_cache).context("Failed to open job cache")?;
    Ok(JobUpdater::new(
        Arc::new(client),
        cache,
        UpdateOptions {
            ignore_cache: settings.job_builder.ignore_cache,
            workers,
        },
    ))
}

/// Path of a job's output file, with folder names as directories.
pub fn output_path(dir: &Path, name: &str) -> PathBuf {
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(dir.to_path_buf(), |path, segment| path.join(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_flags_override_settings() {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("jobforge.kdl");
        std::fs::write(
            &conf,
            r#"
job-builder {
    exclude "old"
}
jenkins {
    url "https://ci.example.com/"
    user "file-user"
}
"#,
        )
        .unwrap();

        let settings = load_settings(&GlobalOptions {
            conf: Some(conf),
            user: Some("cli-user".to_string()),
            allow_empty_variables: true,
            exclude: vec!["tmp*".to_string()],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(settings.jenkins.user.as_deref(), Some("cli-user"));
        assert_eq!(settings.jenkins.url, "https://ci.example.com/");
        assert!(settings.job_builder.allow_empty_variables);
        assert_eq!(settings.job_builder.exclude, vec!["old", "tmp*"]);
    }

    #[test]
    fn test_expand_with_globs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("jobs.yaml"),
            r#"
- job-template:
    name: '{name}-{env}'
- project:
    name: app
    env: [dev, prod]
    jobs: ['{name}-{env}']
"#,
        )
        .unwrap();

        let settings = Settings::default();
        let all = expand(&settings, &[dir.path().to_path_buf()], &[]).unwrap();
        let names: Vec<_> = all.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["app-dev", "app-prod"]);

        let some = expand(&settings, &[dir.path().to_path_buf()], &["*-prod".to_string()]).unwrap();
        assert_eq!(some.jobs.len(), 1);
    }

    #[test]
    fn test_output_path_nests_folders() {
        let dir = Path::new("/out");
        assert_eq!(output_path(dir, "team/app"), PathBuf::from("/out/team/app"));
        assert_eq!(output_path(dir, "app"), PathBuf::from("/out/app"));
    }
}
