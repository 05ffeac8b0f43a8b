use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use courier_common::{ChatId, MessageId};

/// Write-back hook for persisted forward offsets.
///
/// The engines call `persist` after every successfully forwarded logical
/// unit. The host decides where offsets actually live (config file,
/// database). A crash between "forward succeeded" and "offset persisted"
/// yields at-least-once forwarding on restart, never exactly-once.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    async fn persist(&self, source: ChatId, offset: MessageId) -> anyhow::Result<()>;
}

/// Offset store that keeps offsets in memory only. Useful for tests and
/// dry runs; a restart starts over from the configured offsets.
#[derive(Debug, Default)]
pub struct InMemoryOffsetStore {
    offsets: Mutex<HashMap<ChatId, MessageId>>,
}

impl InMemoryOffsetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, source: ChatId) -> Option<MessageId> {
        self.offsets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&source)
            .copied()
    }
}

#[async_trait]
impl OffsetStore for InMemoryOffsetStore {
    async fn persist(&self, source: ChatId, offset: MessageId) -> anyhow::Result<()> {
        self.offsets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(source, offset);
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemoryOffsetStore::new();
        assert_eq!(store.get(ChatId(1)), None);

        store.persist(ChatId(1), MessageId(101)).await.unwrap();
        store.persist(ChatId(1), MessageId(103)).await.unwrap();
        assert_eq!(store.get(ChatId(1)), Some(MessageId(103)));
    }
}
