use std::{collections::HashMap, sync::Arc};

use {
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    courier_channels::{ChatEvent, RawMessage, Transport},
    courier_common::{AgentId, ChatId, MessageId},
    courier_config::{ForwardSpec, LiveSettings, OffsetStore},
    courier_pipeline::{GroupAccumulator, MessagePipeline, MessageUnit},
};

use crate::{
    Error, Result,
    correlation::{EventKey, SharedCorrelationStore},
};

/// Destinations and plugin chain for one source chat.
#[derive(Debug, Clone)]
struct Route {
    destinations: Vec<ChatId>,
    chain: usize,
}

/// Event-driven forwarding for one login session.
///
/// Runs as a single cooperative task: it owns its per-chat grouping state
/// and suspends only at network boundaries. Events for chats without a
/// configured route are silently ignored.
pub struct LiveSyncEngine {
    agent_id: AgentId,
    transport: Arc<dyn Transport>,
    pipeline: Arc<MessagePipeline>,
    routes: HashMap<ChatId, Route>,
    correlation: SharedCorrelationStore,
    offsets: Arc<dyn OffsetStore>,
    settings: LiveSettings,
    accumulators: HashMap<ChatId, GroupAccumulator>,
    cancel: CancellationToken,
}

impl LiveSyncEngine {
    pub fn new(
        agent_id: AgentId,
        transport: Arc<dyn Transport>,
        pipeline: Arc<MessagePipeline>,
        specs: &[ForwardSpec],
        correlation: SharedCorrelationStore,
        offsets: Arc<dyn OffsetStore>,
        settings: LiveSettings,
    ) -> Self {
        let routes = specs
            .iter()
            .map(|spec| {
                (spec.source, Route {
                    destinations: spec.destinations.clone(),
                    chain: spec.chain,
                })
            })
            .collect();
        Self {
            agent_id,
            transport,
            pipeline,
            routes,
            correlation,
            offsets,
            settings,
            accumulators: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the event loop. Cancellation is honored between
    /// events only; an in-flight forward always runs to completion.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Consume platform events until the channel closes or the engine is
    /// cancelled.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ChatEvent>) {
        info!(agent_id = %self.agent_id, routes = self.routes.len(), "live sync started");
        loop {
            let event = tokio::select! {
                () = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle_event(event).await;
        }
        info!(agent_id = %self.agent_id, "live sync stopped");
    }

    /// Process one event. Failures are contained here: they are logged with
    /// chat context and never stop the event stream.
    pub async fn handle_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::NewMessage(raw) => {
                if let Err(e) = self.on_new(&raw).await {
                    warn!(
                        chat_id = %raw.chat_id,
                        message_id = %raw.id,
                        error = %e,
                        "failed to process new message, dropping in-flight accumulation"
                    );
                    self.reset_chat(raw.chat_id).await;
                }
            },
            ChatEvent::MessageEdited(raw) => {
                if let Err(e) = self.on_edited(&raw).await {
                    warn!(
                        chat_id = %raw.chat_id,
                        message_id = %raw.id,
                        error = %e,
                        "failed to propagate edit"
                    );
                }
            },
            ChatEvent::MessagesDeleted { chat_id, ids } => {
                if let Err(e) = self.on_deleted(chat_id, &ids).await {
                    warn!(chat_id = %chat_id, error = %e, "failed to propagate deletions");
                }
            },
        }
    }

    async fn on_new(&mut self, raw: &RawMessage) -> Result<()> {
        let Some(route) = self.routes.get(&raw.chat_id).cloned() else {
            debug!(chat_id = %raw.chat_id, "chat not configured, ignoring message");
            return Ok(());
        };
        info!(chat_id = %raw.chat_id, message_id = %raw.id, "new message received");

        let pipeline = Arc::clone(&self.pipeline);
        let acc = self.accumulators.entry(raw.chat_id).or_default();
        pipeline.apply(route.chain, raw.clone(), acc).await?;

        let ready = acc.drain_ready();
        for mut unit in ready {
            let result = self.forward_unit(&route, &unit).await;
            self.pipeline.cleanup(&mut unit).await;
            result?;
            self.offsets
                .persist(raw.chat_id, unit.last_id())
                .await
                .map_err(|source| Error::Offset { source })?;
        }
        Ok(())
    }

    /// Forward one ready unit to every destination, strictly sequentially,
    /// recording a correlation entry per destination. The offset is not
    /// touched here: only new-message handling advances it, so forwarding
    /// an old uncorrelated edit can never move it backwards.
    async fn forward_unit(&self, route: &Route, unit: &MessageUnit) -> Result<()> {
        let source_chat = unit.source().chat_id;
        let key = EventKey::new(source_chat, unit.source().id);
        let reply_source = unit.source().reply_to;

        for dest in &route.destinations {
            let reply_to = reply_source.and_then(|reply_id| {
                self.correlation
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .lookup(&EventKey::new(source_chat, reply_id))
                    .and_then(|copies| copies.get(dest))
                    .copied()
            });
            let post = unit.to_post(reply_to);
            let dest_id = self.transport.send(*dest, &post).await?;
            self.correlation
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record(key, *dest, dest_id);
            debug!(
                chat_id = %source_chat,
                message_id = %unit.source().id,
                dest = %dest,
                dest_message_id = %dest_id,
                items = unit.item_count(),
                "forwarded unit"
            );
        }
        Ok(())
    }

    async fn on_edited(&mut self, raw: &RawMessage) -> Result<()> {
        let Some(route) = self.routes.get(&raw.chat_id).cloned() else {
            return Ok(());
        };
        info!(chat_id = %raw.chat_id, message_id = %raw.id, "message edited");

        let key = EventKey::new(raw.chat_id, raw.id);
        let copies = self
            .correlation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .lookup(&key)
            .cloned();

        // Edits re-derive the unit in isolation; grouping state is not
        // touched.
        let Some(mut unit) = self.pipeline.apply_single(route.chain, raw).await? else {
            debug!(chat_id = %raw.chat_id, message_id = %raw.id, "edited message vetoed by chain");
            return Ok(());
        };

        let result = match copies {
            Some(copies) => self.propagate_edit(&route, raw, &key, &copies, &unit).await,
            // Never forwarded, evicted, or previously vetoed: treat the
            // edit as a fresh forward attempt.
            None => self.forward_unit(&route, &unit).await,
        };
        self.pipeline.cleanup(&mut unit).await;
        result
    }

    async fn propagate_edit(
        &self,
        route: &Route,
        raw: &RawMessage,
        key: &EventKey,
        copies: &HashMap<ChatId, MessageId>,
        unit: &MessageUnit,
    ) -> Result<()> {
        let delete = self
            .settings
            .delete_on_edit
            .as_deref()
            .is_some_and(|sentinel| sentinel == raw.raw_text);

        if delete {
            info!(
                chat_id = %raw.chat_id,
                message_id = %raw.id,
                "delete-on-edit sentinel matched, deleting copies and source"
            );
            for dest in &route.destinations {
                if let Some(dest_id) = copies.get(dest) {
                    self.transport.delete(*dest, *dest_id).await?;
                }
            }
            self.transport.delete(raw.chat_id, raw.id).await?;
            self.correlation
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(key);
        } else {
            for dest in &route.destinations {
                if let Some(dest_id) = copies.get(dest) {
                    self.transport.edit(*dest, *dest_id, &unit.text).await?;
                }
            }
        }
        Ok(())
    }

    async fn on_deleted(&mut self, chat_id: ChatId, ids: &[MessageId]) -> Result<()> {
        if !self.settings.delete_sync {
            return Ok(());
        }
        let Some(route) = self.routes.get(&chat_id).cloned() else {
            return Ok(());
        };
        info!(chat_id = %chat_id, count = ids.len(), "messages deleted");

        for id in ids {
            let key = EventKey::new(chat_id, *id);
            let Some(copies) = self
                .correlation
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&key)
            else {
                // Never forwarded or already deleted; nothing to do.
                continue;
            };
            for dest in &route.destinations {
                if let Some(dest_id) = copies.get(dest) {
                    self.transport.delete(*dest, *dest_id).await?;
                }
            }
        }
        Ok(())
    }

    /// Drop a chat's in-flight accumulation, releasing staged files.
    async fn reset_chat(&mut self, chat_id: ChatId) {
        let Some(acc) = self.accumulators.get_mut(&chat_id) else {
            return;
        };
        let abandoned = acc.reset();
        if !abandoned.is_empty() {
            debug!(chat_id = %chat_id, dropped = abandoned.len(), "discarding in-flight units");
        }
        let pipeline = Arc::clone(&self.pipeline);
        pipeline.discard(abandoned).await;
    }
}
