//! In-memory transport and stager fakes shared by the sync tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    futures::stream::{self, StreamExt},
};

use {
    courier_channels::{
        Error, FileStager, HistoryOrder, HistoryStream, OutgoingPost, RawMessage, Result,
        Transport,
    },
    courier_common::{ChatId, GroupId, MessageId},
};

/// One send the fake transport accepted.
#[derive(Debug, Clone)]
pub struct SentPost {
    pub dest: ChatId,
    pub text: String,
    pub items: usize,
    pub reply_to: Option<MessageId>,
    pub assigned: MessageId,
}

/// Scriptable in-memory transport. Destination message ids are assigned
/// from a counter starting at 1000 so they never collide with source ids.
pub struct FakeTransport {
    pub backlog: Mutex<HashMap<ChatId, Vec<RawMessage>>>,
    pub sent: Mutex<Vec<SentPost>>,
    pub edits: Mutex<Vec<(ChatId, MessageId, String)>>,
    pub deletes: Mutex<Vec<(ChatId, MessageId)>>,
    /// Errors consumed by the next `send` calls, in order.
    pub send_failures: Mutex<VecDeque<Error>>,
    pub history_calls: AtomicUsize,
    next_id: AtomicI64,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            backlog: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            send_failures: Mutex::new(VecDeque::new()),
            history_calls: AtomicUsize::new(0),
            next_id: AtomicI64::new(1000),
        }
    }

    pub fn with_backlog(chat_id: ChatId, messages: Vec<RawMessage>) -> Self {
        let transport = Self::new();
        transport
            .backlog
            .lock()
            .unwrap()
            .insert(chat_id, messages);
        transport
    }

    pub fn fail_next_send(&self, error: Error) {
        self.send_failures.lock().unwrap().push_back(error);
    }

    pub fn sent_texts(&self, dest: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.dest == dest)
            .map(|post| post.text.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn history(
        &self,
        chat_id: ChatId,
        after: MessageId,
        order: HistoryOrder,
    ) -> HistoryStream<'_> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let mut messages: Vec<RawMessage> = self
            .backlog
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.id > after)
            .collect();
        messages.sort_by_key(|m| m.id);
        if order == HistoryOrder::NewestFirst {
            messages.reverse();
        }
        stream::iter(messages.into_iter().map(Ok)).boxed()
    }

    async fn send(&self, chat_id: ChatId, post: &OutgoingPost) -> Result<MessageId> {
        if let Some(error) = self.send_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let assigned = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().unwrap().push(SentPost {
            dest: chat_id,
            text: post.text.clone(),
            items: post.album.len().max(1),
            reply_to: post.reply_to,
            assigned,
        });
        Ok(assigned)
    }

    async fn edit(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()> {
        self.edits
            .lock()
            .unwrap()
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.deletes.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }
}

/// Stager that only counts cleanups.
#[derive(Default)]
pub struct FakeStager {
    pub cleanups: AtomicUsize,
}

#[async_trait]
impl FileStager for FakeStager {
    async fn stage(&self, _message: &RawMessage) -> Result<PathBuf> {
        Ok(PathBuf::from("/tmp/fake"))
    }

    async fn cleanup(&self, _path: &Path) -> Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Plain text message.
pub fn raw(chat_id: ChatId, id: i64, text: &str) -> RawMessage {
    RawMessage {
        chat_id,
        id: MessageId(id),
        text: text.to_string(),
        raw_text: text.to_string(),
        ..RawMessage::default()
    }
}

/// Message belonging to a media group.
pub fn grouped(chat_id: ChatId, id: i64, text: &str, group: i64) -> RawMessage {
    RawMessage {
        group_id: Some(GroupId(group)),
        ..raw(chat_id, id, text)
    }
}
