//! devenv - local multi-container development environment manager
//!
//! devenv reads a templated compose document, lets an operator pick the
//! services to run, and writes a filtered deployment document for them.
//! It also keeps per-service debugger configuration in line with the host's
//! current network address:
//!
//! - Service graph built from the template document
//! - Active set derived from the deployment document
//! - Filtered deployment document emission
//! - Drift reconciliation of the debug host address

pub mod classify;
pub mod compose;
pub mod config;
pub mod debug;
pub mod env_store;
pub mod error;
pub mod manager;
pub mod network;
pub mod reconcile;
pub mod runtime;

pub use error::{DevenvError, Result};
pub use manager::Environment;
