//! Core definition model and template engine for jobforge.
//!
//! This crate contains:
//! - Definition kinds and raw definitions parsed from YAML documents
//! - The definition store with defaults resolution
//! - Variable interpolation (`{var}`, `{obj:var}`, `{var|default}`)
//! - Macro expansion inside component lists
//! - Project expansion of job-templates into concrete jobs

pub mod definition;
pub mod error;
pub mod expander;
pub mod filter;
pub mod formatter;
pub mod macros;
pub mod store;
pub mod variables;

pub use definition::{DefinitionKind, MacroKind, RawDefinition};
pub use error::{Error, Result, Warning};
pub use expander::{Expander, Expansion, ExpansionOptions, MANAGED_MARKER, RealizedJob, RealizedView};
pub use filter::JobFilter;
pub use formatter::{FormatOptions, Formatter};
pub use macros::MacroResolver;
pub use store::DefinitionStore;
pub use variables::Variables;
