//! Plugin registry: resolves configured plugin identifiers to executable
//! transformation objects.
//!
//! The host registers a factory per plugin id; chains are built from
//! [`PluginChainConfig`](courier_config::PluginChainConfig) at configuration
//! time, so an unknown identifier fails startup instead of the first
//! message.

pub mod error;
pub mod registry;

pub use {
    error::{Error, Result},
    registry::{PluginFactory, PluginRegistry},
};
