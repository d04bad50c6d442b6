//! Compose document handling
//!
//! This module turns the template and deployment compose documents into a
//! service graph, works out which services are deployed, and writes filtered
//! deployment documents.

pub mod active;
pub mod emitter;
pub mod graph;
pub mod parser;
pub mod tree;

pub use active::ActiveSet;
pub use emitter::{materialize, render, MaterializeOutcome};
pub use graph::{Service, ServiceGraph, StructuralIssue};
pub use parser::ComposeParser;
