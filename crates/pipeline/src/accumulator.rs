use std::collections::VecDeque;

use courier_channels::RawMessage;

use crate::unit::MessageUnit;

/// Per-chat grouping state: the unit still accumulating media items, plus a
/// FIFO queue of units that became forward-ready.
///
/// The platform delivers a multi-item post as N physical messages sharing a
/// group id; a unit stays pending until a message that cannot merge into it
/// arrives (or the caller flushes at end of history). That guarantees
/// exactly one forward-ready unit per logical post.
#[derive(Debug, Default)]
pub struct GroupAccumulator {
    pending: Option<MessageUnit>,
    ready: VecDeque<MessageUnit>,
}

impl GroupAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the pipeline outcome for one raw message through the grouping
    /// state machine. `outcome` is `None` when the plugin chain vetoed the
    /// message.
    ///
    /// Returns a redundant unit the caller must still clean up: merging a
    /// same-group message keeps the pending unit and discards the freshly
    /// built one.
    pub fn absorb(
        &mut self,
        outcome: Option<MessageUnit>,
        raw: &RawMessage,
    ) -> Option<MessageUnit> {
        let Some(unit) = outcome else {
            // Vetoed message. A trailing caption-only message of the *next*
            // group still contributes its text to whatever comes after the
            // pending unit.
            if let Some(pending) = self.pending.as_mut()
                && let Some(gid) = raw.group_id
                && Some(gid) != pending.group_id()
            {
                pending.push_deferred_text(&raw.text);
            }
            return None;
        };

        if self.pending.is_none() {
            self.pending = Some(unit);
            return None;
        }

        let pending_group = self.pending.as_ref().and_then(MessageUnit::group_id);
        if unit.group_id().is_some() && unit.group_id() == pending_group {
            // Same post: fold the item into the pending unit, drop the
            // duplicate built by the chain.
            if let Some(pending) = self.pending.as_mut() {
                pending.merge(raw.clone());
            }
            return Some(unit);
        }

        // A new post begins; the pending unit is complete.
        let mut unit = unit;
        if unit.group_id().is_some()
            && let Some(pending) = self.pending.as_mut()
        {
            let deferred = pending.take_deferred_text();
            unit.splice_text(&deferred);
        }
        if let Some(done) = self.pending.replace(unit) {
            self.ready.push_back(done);
        }
        None
    }

    /// Next forward-ready unit, consumed strictly FIFO.
    pub fn pop_ready(&mut self) -> Option<MessageUnit> {
        self.ready.pop_front()
    }

    /// Take every forward-ready unit at once.
    pub fn drain_ready(&mut self) -> Vec<MessageUnit> {
        self.ready.drain(..).collect()
    }

    /// Promote the pending unit to forward-ready. Called at the end of a
    /// backlog pass so the trailing post is not lost.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.ready.push_back(pending);
        }
    }

    /// Drop all in-flight state, returning the abandoned units so the
    /// caller can release their staged files.
    pub fn reset(&mut self) -> Vec<MessageUnit> {
        let mut units: Vec<MessageUnit> = self.ready.drain(..).collect();
        if let Some(pending) = self.pending.take() {
            units.push(pending);
        }
        units
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.ready.is_empty()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
