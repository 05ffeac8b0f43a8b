use std::sync::Arc;

use {
    futures::StreamExt,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    courier_channels::{HistoryOrder, Transport},
    courier_common::AgentId,
    courier_config::{AgentConfig, AgentKind, BacklogSettings, ForwardSpec, OffsetStore},
    courier_pipeline::{GroupAccumulator, MessagePipeline, MessageUnit},
};

use crate::{
    Error, Result,
    correlation::{EventKey, SharedCorrelationStore},
};

/// Resumable catch-up sync: replays historical messages strictly after the
/// persisted offset, through the same pipeline as live sync.
///
/// Runs to completion and returns; the caller starts live sync afterwards,
/// never concurrently for the same route.
pub struct BacklogSyncEngine {
    agent_id: AgentId,
    transport: Arc<dyn Transport>,
    pipeline: Arc<MessagePipeline>,
    correlation: SharedCorrelationStore,
    offsets: Arc<dyn OffsetStore>,
    settings: BacklogSettings,
    cancel: CancellationToken,
}

impl BacklogSyncEngine {
    pub fn new(
        agent_id: AgentId,
        transport: Arc<dyn Transport>,
        pipeline: Arc<MessagePipeline>,
        correlation: SharedCorrelationStore,
        offsets: Arc<dyn OffsetStore>,
        settings: BacklogSettings,
    ) -> Self {
        Self {
            agent_id,
            transport,
            pipeline,
            correlation,
            offsets,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run catch-up for every spec, in order. Each spec's pass is re-run
    /// while the previous pass forwarded at least one unit, bounded by the
    /// retry budget; a zero-forward pass means the backlog is exhausted.
    ///
    /// The platform does not let bot accounts read chat history, so bot
    /// agents are refused up front.
    pub async fn run(&self, agent: &AgentConfig, specs: &mut [ForwardSpec]) {
        if agent.kind == AgentKind::Bot {
            warn!(
                agent_id = %self.agent_id,
                "backlog sync requires a user account, bot accounts cannot read chat history"
            );
            return;
        }

        for spec in specs.iter_mut() {
            let mut passes = 0usize;
            loop {
                if self.cancel.is_cancelled() {
                    return;
                }
                let forwarded = self.run_pass(spec).await;
                passes += 1;
                info!(
                    agent_id = %self.agent_id,
                    source = %spec.source,
                    pass = passes,
                    forwarded,
                    "backlog pass finished"
                );
                if forwarded == 0 || passes >= self.settings.retry_budget {
                    break;
                }
            }
        }
    }

    /// One full pass over a chat's backlog. Returns the number of logical
    /// units forwarded; per-message failures are logged and skipped without
    /// advancing the offset.
    async fn run_pass(&self, spec: &mut ForwardSpec) -> usize {
        info!(
            source = %spec.source,
            destinations = ?spec.destinations,
            offset = %spec.offset,
            "starting backlog pass"
        );
        let mut forwarded = 0usize;
        let mut acc = GroupAccumulator::new();

        let mut history =
            self.transport
                .history(spec.source, spec.offset, HistoryOrder::OldestFirst);
        while let Some(item) = history.next().await {
            if self.cancel.is_cancelled() {
                break;
            }
            let raw = match item {
                Ok(raw) => raw,
                Err(e) => {
                    if let Some(wait) = e.retry_after() {
                        info!(
                            source = %spec.source,
                            seconds = wait.as_secs(),
                            "rate limited while reading history, sleeping"
                        );
                        tokio::time::sleep(wait).await;
                    } else {
                        warn!(source = %spec.source, error = %e, "history read failed, skipping");
                    }
                    continue;
                },
            };

            if raw.service {
                continue;
            }
            if let Some(end) = spec.end
                && raw.id > end
            {
                debug!(source = %spec.source, end = %end, "reached end of configured range");
                break;
            }

            if let Err(e) = self
                .pipeline
                .apply(spec.chain, raw.clone(), &mut acc)
                .await
            {
                warn!(
                    source = %spec.source,
                    message_id = %raw.id,
                    error = %e,
                    "plugin chain failed, skipping message"
                );
                continue;
            }
            forwarded += self.forward_ready(spec, &mut acc).await;
        }
        drop(history);

        // The trailing post never sees a successor; release it explicitly.
        acc.flush();
        forwarded += self.forward_ready(spec, &mut acc).await;

        forwarded
    }

    /// Forward every ready unit, advancing and persisting the offset after
    /// each success and pacing with the configured delay. A failed forward
    /// leaves the offset untouched.
    async fn forward_ready(&self, spec: &mut ForwardSpec, acc: &mut GroupAccumulator) -> usize {
        let mut count = 0usize;
        while let Some(mut unit) = acc.pop_ready() {
            let last_id = unit.last_id();
            let result = self.forward_unit(spec, &unit).await;
            self.pipeline.cleanup(&mut unit).await;

            match result {
                Ok(()) => {
                    spec.offset = last_id;
                    if let Err(e) = self.offsets.persist(spec.source, spec.offset).await {
                        warn!(source = %spec.source, error = %e, "failed to persist offset");
                    }
                    count += 1;
                    info!(source = %spec.source, offset = %spec.offset, "forwarded message");
                    tokio::time::sleep(self.settings.delay()).await;
                },
                Err(e) => {
                    warn!(
                        source = %spec.source,
                        message_id = %last_id,
                        error = %e,
                        "forward failed, offset unchanged"
                    );
                },
            }
        }
        count
    }

    /// Fan out one unit to all destinations, strictly sequentially. A
    /// rate-limit signal suspends for exactly the signaled duration and
    /// retries the same destination, so nothing is skipped or duplicated.
    async fn forward_unit(&self, spec: &ForwardSpec, unit: &MessageUnit) -> Result<()> {
        let source_chat = unit.source().chat_id;
        let key = EventKey::new(source_chat, unit.source().id);
        let reply_source = unit.source().reply_to;

        for dest in &spec.destinations {
            loop {
                let reply_to = reply_source.and_then(|reply_id| {
                    self.correlation
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .lookup(&EventKey::new(source_chat, reply_id))
                        .and_then(|copies| copies.get(dest))
                        .copied()
                });
                let post = unit.to_post(reply_to);
                match self.transport.send(*dest, &post).await {
                    Ok(dest_id) => {
                        self.correlation
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .record(key, *dest, dest_id);
                        break;
                    },
                    Err(e) => match e.retry_after() {
                        Some(wait) => {
                            info!(
                                dest = %dest,
                                seconds = wait.as_secs(),
                                "rate limited, sleeping before retry"
                            );
                            tokio::time::sleep(wait).await;
                        },
                        None => return Err(Error::Transport(e)),
                    },
                }
            }
        }
        Ok(())
    }
}
