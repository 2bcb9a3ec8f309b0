//! Error and warning types for jobforge.

use derive_more::Display;
use thiserror::Error;

use crate::definition::DefinitionKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing variable '{placeholder}' while formatting {context:?}")]
    MissingVariable { placeholder: String, context: String },

    #[error("unknown {kind} '{name}' referenced from {referenced_from}")]
    UnknownReference {
        kind: DefinitionKind,
        name: String,
        referenced_from: String,
    },

    #[error("duplicate {kind} definition: '{name}'")]
    DuplicateDefinition { kind: DefinitionKind, name: String },

    #[error("macro expansion cycle: {}", chain.join(" -> "))]
    MacroCycle { chain: Vec<String> },

    #[error("variable substitution cycle: {}", chain.join(" -> "))]
    SubstitutionCycle { chain: Vec<String> },

    #[error("job-group cycle: {}", chain.join(" -> "))]
    GroupCycle { chain: Vec<String> },

    #[error("malformed template {template:?}: {message}")]
    MalformedTemplate { template: String, message: String },

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid job name pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A non-fatal condition recorded while ingesting or expanding definitions.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Warning {
    /// A definition replaced an earlier one with the same name or id.
    #[display("duplicate {kind} '{name}' overrides an earlier definition")]
    DuplicateDefinition { kind: DefinitionKind, name: String },

    /// The same job was listed more than once in a project.
    #[display("duplicate job '{job}' specified for project '{project}'")]
    DuplicateProjectJob { project: String, job: String },

    /// Two realized jobs ended up with the same name; the later one was kept.
    #[display("duplicate definitions for job '{name}' specified")]
    DuplicateJob { name: String },
}
