//! Host network inspection
//!
//! This module finds the host's local address used as the debug endpoint.

pub mod address;

pub use address::{AddressPolicy, AddressProbe, FixedProbe, SystemProbe};
