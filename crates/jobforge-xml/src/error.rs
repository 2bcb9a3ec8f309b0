//! XML generation errors.

use jobforge_core::MacroKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("unknown {kind} component '{name}'")]
    UnknownComponent { kind: MacroKind, name: String },

    #[error("no module handles {0} components")]
    UnknownComponentType(MacroKind),

    #[error("unrecognized {attribute}: {value} (supported types are: {supported})")]
    UnknownType {
        attribute: &'static str,
        value: String,
        supported: String,
    },

    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    #[error("invalid value for '{field}' in {context}: {message}")]
    InvalidValue {
        field: String,
        context: String,
        message: String,
    },

    #[error("XML write error: {0}")]
    Write(String),

    #[error("XML read error: {0}")]
    Read(String),
}

pub type XmlResult<T> = std::result::Result<T, XmlError>;
