use std::sync::Arc;

use async_trait::async_trait;

use crate::unit::MessageUnit;

/// Outcome of one plugin application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginAction {
    /// Keep the (possibly mutated) unit and run the next plugin.
    Continue,
    /// Unconditionally drop the message; the chain aborts and the unit is
    /// discarded with its staged file cleaned up.
    Veto,
}

/// A transformation plugin in a chain.
///
/// The registry in `courier-plugins` resolves configured identifiers to
/// implementations of this trait; the pipeline only cares about this
/// contract.
#[async_trait]
pub trait MessagePlugin: Send + Sync {
    /// Stable identifier, matched against the configured entry id.
    fn id(&self) -> &str;

    /// One-time asynchronous initialization, run before the first message
    /// passes through the chain.
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Transform the unit in place, or veto it.
    async fn modify(&self, unit: &mut MessageUnit) -> anyhow::Result<PluginAction>;
}

/// Ordered chain of plugins shared by the routes that reference it.
pub type PluginChain = Vec<Arc<dyn MessagePlugin>>;
