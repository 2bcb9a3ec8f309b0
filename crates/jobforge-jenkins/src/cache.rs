//! Per-server cache of the md5 of each uploaded job's XML.

use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::{JenkinsError, JenkinsResult};

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\-~]").expect("valid regex"));

/// Job name to md5 digest, stored as YAML with one file per Jenkins URL.
#[derive(Debug)]
pub struct JobCache {
    path: PathBuf,
    data: BTreeMap<String, String>,
}

impl JobCache {
    /// `$XDG_CACHE_HOME/jobforge`, falling back to `~/.cache/jobforge`.
    pub fn default_dir() -> JenkinsResult<PathBuf> {
        let base = match std::env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::var_os("HOME")
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".cache"))
                .ok_or(JenkinsError::NoCacheDir)?,
        };
        Ok(base.join("jobforge"))
    }

    /// Open the cache for `jenkins_url` in the default directory.
    pub fn open(jenkins_url: &str, flush: bool) -> JenkinsResult<Self> {
        Self::open_in(&Self::default_dir()?, jenkins_url, flush)
    }

    /// Open the cache for `jenkins_url` under `dir`, creating the directory.
    ///
    /// With `flush` any stored digests are ignored.
    pub fn open_in(dir: &Path, jenkins_url: &str, flush: bool) -> JenkinsResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| JenkinsError::cache(dir, e))?;
        let path = dir.join(Self::file_name(jenkins_url));

        let data: BTreeMap<String, String> = if flush || !path.is_file() {
            BTreeMap::new()
        } else {
            let text = std::fs::read_to_string(&path).map_err(|e| JenkinsError::cache(&path, e))?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_yaml::from_str(&text).map_err(|e| JenkinsError::cache(&path, e))?
            }
        };
        debug!(path = %path.display(), entries = data.len(), "Using job cache");

        Ok(Self { path, data })
    }

    /// `cache-host-jobs-<url>.yml` with every character outside
    /// `[A-Za-z0-9-~]` replaced by `_`.
    pub fn file_name(jenkins_url: &str) -> String {
        format!("cache-host-jobs-{}.yml", UNSAFE_CHARS.replace_all(jenkins_url, "_"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set(&mut self, job: impl Into<String>, md5: impl Into<String>) {
        self.data.insert(job.into(), md5.into());
    }

    pub fn remove(&mut self, job: &str) -> Option<String> {
        self.data.remove(job)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn is_cached(&self, job: &str) -> bool {
        self.data.contains_key(job)
    }

    /// Whether `md5` differs from the stored digest (or none is stored).
    pub fn has_changed(&self, job: &str, md5: &str) -> bool {
        self.data.get(job).is_none_or(|cached| cached != md5)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the cache through a temporary file in the same directory,
    /// then rename it over the cache file.
    pub fn save(&self) -> JenkinsResult<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let yaml = serde_yaml::to_string(&self.data).map_err(|e| JenkinsError::cache(&self.path, e))?;

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| JenkinsError::cache(dir, e))?;
        file.write_all(yaml.as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| JenkinsError::cache(file.path(), e))?;
        file.persist(&self.path)
            .map_err(|e| JenkinsError::cache(&self.path, e.error))?;

        debug!(path = %self.path.display(), entries = self.data.len(), "Job cache written");
        Ok(())
    }
}
