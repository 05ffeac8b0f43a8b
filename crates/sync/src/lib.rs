//! Dual-mode synchronization engines.
//!
//! [`LiveSyncEngine`] consumes platform events as they happen;
//! [`BacklogSyncEngine`] replays history from a persisted offset. Both
//! drive the same pipeline and share the [`CorrelationStore`] that maps a
//! source message to the destination copies it produced, which is what
//! makes edit and delete propagation possible.
//!
//! Backlog and live sync for the same route must not run concurrently;
//! finishing backlog before starting live is the caller's responsibility.

pub mod backlog;
pub mod correlation;
pub mod live;

pub use {
    backlog::BacklogSyncEngine,
    correlation::{CorrelationStore, EventKey, SharedCorrelationStore},
    live::LiveSyncEngine,
};

/// Crate-wide result type for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-message failures inside the engines. These are contained at
/// message/chat granularity and logged; they never abort a session task.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Pipeline(#[from] courier_pipeline::Error),

    #[error(transparent)]
    Transport(#[from] courier_channels::Error),

    #[error("offset persistence failed: {source}")]
    Offset {
        #[source]
        source: anyhow::Error,
    },
}
