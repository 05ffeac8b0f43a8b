use std::sync::Arc;

use tracing::{debug, trace};

use courier_channels::{FileStager, RawMessage};

use crate::{
    Error, Result,
    accumulator::GroupAccumulator,
    plugin::{PluginAction, PluginChain},
    unit::MessageUnit,
};

/// Applies plugin chains and the grouping state machine.
///
/// One pipeline instance serves every route of a session; per-chat grouping
/// state lives in the caller-owned [`GroupAccumulator`]s.
pub struct MessagePipeline {
    chains: Vec<PluginChain>,
    stager: Arc<dyn FileStager>,
}

impl MessagePipeline {
    #[must_use]
    pub fn new(chains: Vec<PluginChain>, stager: Arc<dyn FileStager>) -> Self {
        Self { chains, stager }
    }

    /// Run every plugin's one-time initialization. Call once before the
    /// first message passes through.
    pub async fn init(&self) -> Result<()> {
        for chain in &self.chains {
            for plugin in chain {
                plugin.init().await.map_err(|source| Error::Plugin {
                    id: plugin.id().to_string(),
                    source,
                })?;
                trace!(plugin = plugin.id(), "plugin initialized");
            }
        }
        Ok(())
    }

    /// Build a unit from `raw`, run it through chain `chain`, and feed the
    /// outcome into the grouping accumulator. Forward-ready units are
    /// collected from the accumulator by the caller.
    pub async fn apply(
        &self,
        chain: usize,
        raw: RawMessage,
        acc: &mut GroupAccumulator,
    ) -> Result<()> {
        let outcome = self.apply_single(chain, &raw).await?;
        if let Some(mut duplicate) = acc.absorb(outcome, &raw) {
            // Same-group merge keeps the pending unit; the fresh one only
            // existed to run the chain.
            duplicate.clear(&*self.stager).await;
        }
        Ok(())
    }

    /// Run the chain over one raw message without touching grouping state.
    /// Used for edit events, which re-derive a unit in isolation.
    ///
    /// Returns `None` when a plugin vetoed the message; the unit has been
    /// cleaned up by then. A plugin error also cleans up before it
    /// propagates.
    pub async fn apply_single(&self, chain: usize, raw: &RawMessage) -> Result<Option<MessageUnit>> {
        let plugins = self
            .chains
            .get(chain)
            .ok_or(Error::UnknownChain { chain })?;

        let mut unit = MessageUnit::from_raw(raw.clone());
        for plugin in plugins {
            match plugin.modify(&mut unit).await {
                Ok(PluginAction::Continue) => {
                    trace!(plugin = plugin.id(), message_id = %raw.id, "plugin applied");
                },
                Ok(PluginAction::Veto) => {
                    debug!(plugin = plugin.id(), message_id = %raw.id, "plugin vetoed message");
                    unit.clear(&*self.stager).await;
                    return Ok(None);
                },
                Err(source) => {
                    unit.clear(&*self.stager).await;
                    return Err(Error::Plugin {
                        id: plugin.id().to_string(),
                        source,
                    });
                },
            }
        }
        Ok(Some(unit))
    }

    /// Release a unit's staged file after forwarding or rejection.
    pub async fn cleanup(&self, unit: &mut MessageUnit) {
        unit.clear(&*self.stager).await;
    }

    /// Discard abandoned units (error paths, accumulator resets), releasing
    /// their staged files.
    pub async fn discard(&self, units: Vec<MessageUnit>) {
        for mut unit in units {
            unit.clear(&*self.stager).await;
        }
    }
}
