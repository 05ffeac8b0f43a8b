//! Configuration surface for courier.
//!
//! The actual config-file loading and CLI live outside this workspace; the
//! host supplies ordered [`ForwardSpec`]s, plugin chain definitions, agent
//! settings, and an [`OffsetStore`] write-back hook. This crate only defines
//! those shapes and validates them.

pub mod error;
pub mod offsets;
pub mod schema;

pub use {
    error::{Error, Result},
    offsets::{InMemoryOffsetStore, OffsetStore},
    schema::{
        AgentConfig, AgentKind, BacklogSettings, ForwardSpec, LiveSettings, PluginChainConfig,
        PluginEntry,
    },
};
