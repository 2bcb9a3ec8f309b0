//! `jobforge delete` and `jobforge delete-all`.

use anyhow::{Context, Result, bail};
use jobforge_config::Settings;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::info;

use super::{GlobalOptions, expand, job_updater};

pub async fn delete(
    settings: &Settings,
    options: &GlobalOptions,
    names: &[String],
    paths: &[PathBuf],
) -> Result<()> {
    let names: Vec<String> = if paths.is_empty() {
        names.to_vec()
    } else {
        expand(settings, paths, names)?
            .jobs
            .into_iter()
            .map(|job| job.name)
            .collect()
    };

    let mut updater = job_updater(settings, options, 1)?;
    let deleted = updater
        .delete_jobs(&names)
        .await
        .context("Failed to delete jobs")?;
    info!(deleted, "Number of jobs deleted");
    Ok(())
}

pub async fn delete_all(settings: &Settings, options: &GlobalOptions, yes: bool) -> Result<()> {
    if !yes && !confirm(&settings.jenkins.url)? {
        bail!("Aborted");
    }

    let mut updater = job_updater(settings, options, 1)?;
    let deleted = updater
        .delete_all()
        .await
        .context("Failed to delete all jobs")?;
    info!(deleted, "Number of jobs deleted");
    Ok(())
}

fn confirm(url: &str) -> Result<bool> {
    eprint!(
        "Sure you want to delete *ALL* jobs from {url}? \
         (including those not managed by jobforge) (y/N): "
    );
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
