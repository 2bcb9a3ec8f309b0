//! `jobforge update`: upload changed jobs.

use anyhow::{Context, Result};
use jobforge_config::Settings;
use jobforge_xml::{ModuleRegistry, XmlGenerator};
use std::path::PathBuf;
use tracing::info;

use super::{GlobalOptions, expand, job_updater};

pub async fn run(
    settings: &Settings,
    options: &GlobalOptions,
    paths: &[PathBuf],
    globs: &[String],
    delete_old: bool,
    workers: usize,
) -> Result<()> {
    let expansion = expand(settings, paths, globs)?;
    let registry = ModuleRegistry::with_core();
    let jobs = XmlGenerator::new(&registry).generate_jobs(&expansion.jobs)?;
    info!(jobs = jobs.len(), "Number of jobs generated");
    if !expansion.views.is_empty() {
        info!(views = expansion.views.len(), "Views are only rendered by `jobforge test`");
    }

    let mut updater = job_updater(settings, options, workers)?;
    let summary = updater
        .update_jobs(&jobs)
        .await
        .context("Failed to update jobs")?;
    info!(
        updated = summary.updated.len(),
        unchanged = summary.unchanged,
        "Number of jobs updated"
    );

    if delete_old {
        let keep: Vec<String> = jobs.iter().map(|job| job.name.clone()).collect();
        let deleted = updater
            .delete_old_managed(&keep)
            .await
            .context("Failed to delete obsolete jobs")?;
        info!(deleted = deleted.len(), "Number of jobs deleted");
    }
    Ok(())
}
