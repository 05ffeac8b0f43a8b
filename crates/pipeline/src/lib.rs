//! Message transformation and grouping pipeline.
//!
//! A raw platform message becomes a [`MessageUnit`], runs through an ordered
//! plugin chain (any plugin can veto), and then through the grouping
//! accumulator that reassembles multi-item posts into exactly one
//! forward-ready unit per logical post. Both sync engines drive the same
//! [`MessagePipeline`].

pub mod accumulator;
pub mod pipeline;
pub mod plugin;
pub mod unit;

pub use {
    accumulator::GroupAccumulator,
    pipeline::MessagePipeline,
    plugin::{MessagePlugin, PluginAction, PluginChain},
    unit::MessageUnit,
};

/// Crate-wide result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A route referenced a chain index that was never configured.
    #[error("unknown plugin chain: {chain}")]
    UnknownChain { chain: usize },

    /// A plugin raised while transforming a unit. The unit has already been
    /// discarded and cleaned up when this surfaces.
    #[error("plugin '{id}' failed: {source}")]
    Plugin {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}
