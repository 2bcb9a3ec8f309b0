//! Jenkins collaboration for jobforge.
//!
//! This crate contains:
//! - The [`JenkinsApi`] trait and its HTTP implementation
//! - The on-disk cache of uploaded job digests
//! - The updater that uploads changed jobs and removes stale ones

pub mod cache;
pub mod client;
pub mod error;
pub mod updater;

pub use cache::JobCache;
pub use client::{JenkinsApi, JenkinsClient, JobSummary, job_path};
pub use error::{JenkinsError, JenkinsResult};
pub use updater::{DELETE_ALL_SCRIPT, JobUpdater, UpdateOptions, UpdateSummary};
