//! In-process emulation of a control plane's watch subsystem.
//!
//! A scheduler simulation injects resource changes (pods, services,
//! replication controllers, persistent volumes and claims, nodes) through a
//! [`RestClient`]; code that would normally consume an API server's watch
//! stream opens watches on the same client and receives those changes in
//! emission order. See [`watch`] for the delivery contract.

mod client;
mod config;
mod errors;
mod metrics;
mod resources;
pub mod watch;

pub use client::*;
pub use config::*;
pub use errors::*;
pub use metrics::*;
pub use resources::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
