//! Pushing generated jobs to Jenkins.

use futures::StreamExt;
use jobforge_core::MANAGED_MARKER;
use jobforge_xml::{XmlJob, extract_description};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{JenkinsApi, JenkinsResult, JobCache};

/// Groovy run by [`JobUpdater::delete_all`].
pub const DELETE_ALL_SCRIPT: &str =
    "for(job in jenkins.model.Jenkins.theInstance.getAllItems()) { job.delete(); }";

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Upload every job even when its digest matches the cache.
    pub ignore_cache: bool,
    /// Concurrent uploads; 0 uses the number of available CPUs.
    pub workers: usize,
}

impl UpdateOptions {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

/// Outcome of [`JobUpdater::update_jobs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Jobs uploaded, in name order.
    pub updated: Vec<String>,
    /// Jobs skipped because the cache says they are unchanged.
    pub unchanged: usize,
}

pub struct JobUpdater {
    api: Arc<dyn JenkinsApi>,
    cache: JobCache,
    options: UpdateOptions,
}

impl JobUpdater {
    pub fn new(api: Arc<dyn JenkinsApi>, cache: JobCache, options: UpdateOptions) -> Self {
        Self {
            api,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &JobCache {
        &self.cache
    }

    /// Upload jobs whose XML changed since the last run.
    ///
    /// Successful uploads are recorded in the cache and the cache is saved
    /// before the first upload error, if any, is returned.
    pub async fn update_jobs(&mut self, jobs: &[XmlJob]) -> JenkinsResult<UpdateSummary> {
        let mut pending = Vec::new();
        let mut unchanged = 0;
        for job in jobs {
            let md5 = job.md5()?;
            if self.options.ignore_cache || self.cache.has_changed(&job.name, &md5) {
                pending.push((job.name.clone(), job.output_string()?, md5));
            } else {
                debug!(job = %job.name, "Job has not changed");
                unchanged += 1;
            }
        }
        pending.sort_by(|a, b| a.0.cmp(&b.0));

        if pending.is_empty() {
            info!(unchanged, "No jobs to update");
            return Ok(UpdateSummary {
                updated: Vec::new(),
                unchanged,
            });
        }

        let known: Arc<HashSet<String>> = Arc::new(
            self.api
                .list_jobs()
                .await?
                .into_iter()
                .map(|job| job.name)
                .collect(),
        );

        let workers = self.options.worker_count();
        info!(jobs = pending.len(), workers, "Updating jobs");

        let results: Vec<_> = futures::stream::iter(pending)
            .map(|(name, xml, md5)| {
                let api = self.api.clone();
                let known = known.clone();
                async move {
                    let result = upload(api.as_ref(), &known, &name, &xml).await;
                    (name, md5, result)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut updated = Vec::new();
        let mut first_error = None;
        for (name, md5, result) in results {
            match result {
                Ok(()) => {
                    self.cache.set(name.clone(), md5);
                    updated.push(name);
                }
                Err(e) => {
                    warn!(job = %name, error = %e, "Failed to update job");
                    first_error.get_or_insert(e);
                }
            }
        }
        self.cache.save()?;

        if let Some(e) = first_error {
            return Err(e);
        }
        updated.sort();
        Ok(UpdateSummary { updated, unchanged })
    }

    /// Delete the named jobs that exist, forgetting their cached digests.
    ///
    /// Returns the number of jobs deleted.
    pub async fn delete_jobs(&mut self, names: &[String]) -> JenkinsResult<usize> {
        info!(jobs = %names.join(", "), "Removing Jenkins jobs");
        let mut deleted = 0;
        for name in names {
            if self.api.job_exists(name).await? {
                self.api.delete_job(name).await?;
                deleted += 1;
            } else {
                debug!(job = %name, "Job does not exist");
            }
            self.cache.remove(name);
        }
        self.cache.save()?;
        Ok(deleted)
    }

    /// Delete every job on the server with a single groovy script.
    pub async fn delete_all(&mut self) -> JenkinsResult<usize> {
        let count = self.api.list_jobs().await?.len();
        info!(count, "Deleting all jobs");
        self.api.run_script(DELETE_ALL_SCRIPT).await?;
        self.cache.clear();
        self.cache.save()?;
        Ok(count)
    }

    /// Delete managed jobs that are not in `keep`.
    ///
    /// A job is managed when its description ends with [`MANAGED_MARKER`];
    /// other jobs are left alone.
    pub async fn delete_old_managed(&mut self, keep: &[String]) -> JenkinsResult<Vec<String>> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let mut deleted = Vec::new();

        for job in self.api.list_jobs().await? {
            if keep.contains(job.name.as_str()) {
                debug!(job = %job.name, "Keeping job");
                continue;
            }
            if !is_managed(self.api.as_ref(), &job.name).await? {
                info!(job = %job.name, "Not deleting unmanaged Jenkins job");
                continue;
            }
            info!(job = %job.name, "Removing obsolete Jenkins job");
            self.api.delete_job(&job.name).await?;
            self.cache.remove(&job.name);
            deleted.push(job.name);
        }

        if !deleted.is_empty() {
            self.cache.save()?;
        }
        Ok(deleted)
    }
}

async fn upload(api: &dyn JenkinsApi, known: &HashSet<String>, name: &str, xml: &str) -> JenkinsResult<()> {
    if known.contains(name) || api.job_exists(name).await? {
        api.reconfigure_job(name, xml).await
    } else {
        api.create_job(name, xml).await
    }
}

/// Whether the job's description carries the managed marker.
pub async fn is_managed(api: &dyn JenkinsApi, name: &str) -> JenkinsResult<bool> {
    let config = api.get_config(name).await?;
    let description = extract_description(&config)?;
    Ok(description.is_some_and(|d| d.trim_end().ends_with(MANAGED_MARKER)))
}
