//! `jobforge list`: names of defined or deployed jobs.

use anyhow::{Context, Result};
use jobforge_config::Settings;
use jobforge_core::JobFilter;
use jobforge_jenkins::JenkinsApi;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{expand, jenkins_client};

pub async fn run(settings: &Settings, paths: &[PathBuf], globs: &[String]) -> Result<()> {
    let names = if paths.is_empty() {
        remote_jobs(settings, globs).await?
    } else {
        expand(settings, paths, globs)?
            .jobs
            .into_iter()
            .map(|job| job.name)
            .collect()
    };

    let names = sorted_names(names);
    info!(count = names.len(), "Matching jobs");
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn remote_jobs(settings: &Settings, globs: &[String]) -> Result<Vec<String>> {
    let filter = if globs.is_empty() {
        None
    } else {
        Some(JobFilter::new(globs)?)
    };
    let client = jenkins_client(settings)?;
    let jobs = client.list_jobs().await.context("Failed to list Jenkins jobs")?;
    Ok(jobs
        .into_iter()
        .map(|job| job.name)
        .filter(|name| filter.as_ref().is_none_or(|f| f.matches(name)))
        .collect())
}

/// Sort names, warning about any that appear twice.
fn sorted_names(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            warn!(job = %name, "Found duplicate job name, likely bug");
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_names() {
        let names = sorted_names(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(names, vec!["a", "b", "b"]);
    }
}
