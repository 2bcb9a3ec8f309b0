//! Jenkins XML generation for jobforge.
//!
//! This crate contains:
//! - An owned XML element tree with pretty serialization
//! - The module and component registry
//! - Built-in modules for freestyle projects and list/all views
//! - Generation of XML documents from realized jobs and views

pub mod element;
pub mod error;
pub mod generator;
pub mod modules;
pub mod registry;
pub mod views;

pub use element::{XmlElement, extract_description};
pub use error::{XmlError, XmlResult};
pub use generator::{XmlGenerator, XmlJob};
pub use registry::{Component, ComponentFn, Module, ModuleRegistry};
