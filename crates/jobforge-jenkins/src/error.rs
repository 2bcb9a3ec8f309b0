//! Errors talking to Jenkins or maintaining the job cache.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JenkinsError {
    #[error("invalid Jenkins URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Jenkins returned {status} for {url}: {body}")]
    Api { url: String, status: u16, body: String },

    #[error("unexpected response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("could not locate a cache directory: neither XDG_CACHE_HOME nor HOME is set")]
    NoCacheDir,

    #[error("cache file {path}: {message}")]
    Cache { path: PathBuf, message: String },

    #[error(transparent)]
    Xml(#[from] jobforge_xml::XmlError),
}

pub type JenkinsResult<T> = Result<T, JenkinsError>;

impl JenkinsError {
    pub(crate) fn cache(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Cache {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
