//! Settings and definition loading for jobforge.
//!
//! This crate handles:
//! - The KDL settings file (`job-builder` and `jenkins` sections)
//! - Discovery of YAML definition files
//! - YAML parsing with include tags

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use loader::{Loader, LoaderOptions};
pub use settings::{JenkinsSettings, JobBuilderSettings, Settings};
