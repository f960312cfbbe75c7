//! TrafficGuard command-line host
//!
//! Wires the policy synchronizer and the interception middleware into a runnable
//! listener, and exposes the pieces for integration testing.

pub mod cli;
pub mod config;
pub mod metrics;
pub mod server;

pub use config::{Config, StoreConfig};
