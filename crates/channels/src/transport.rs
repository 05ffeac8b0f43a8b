use std::path::PathBuf;

use {
    async_trait::async_trait,
    futures::stream::BoxStream,
    serde::{Deserialize, Serialize},
};

use courier_common::{ChatId, GroupId, MessageId};

use crate::error::Result;

// ── Inbound messages ────────────────────────────────────────────────────────

/// Media classification of a message, in the platform's probe order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Audio,
    Gif,
    Video,
    VideoNote,
    Sticker,
    Contact,
    Photo,
    Document,
    #[default]
    NoFile,
}

impl FileKind {
    /// Whether the message carries any media at all.
    #[must_use]
    pub fn has_file(&self) -> bool {
        !matches!(self, Self::NoFile)
    }
}

/// One physical message as delivered by the platform.
///
/// A multi-item post arrives as several of these sharing a `group_id`;
/// reassembly into one logical unit is the pipeline's job, not the
/// transport's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMessage {
    pub chat_id: ChatId,
    pub id: MessageId,
    /// Formatted text (entities rendered), what gets forwarded.
    pub text: String,
    /// Text stripped of all formatting.
    pub raw_text: String,
    pub sender_id: Option<i64>,
    pub group_id: Option<GroupId>,
    pub reply_to: Option<MessageId>,
    pub file: FileKind,
    /// Service messages (joins, pins, topic changes) carry no forwardable
    /// content and are skipped by backlog iteration.
    pub service: bool,
}

/// Events delivered by the platform's live update stream.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    NewMessage(RawMessage),
    MessageEdited(RawMessage),
    /// The platform reports deletions in batches, without chat contents.
    MessagesDeleted {
        chat_id: ChatId,
        ids: Vec<MessageId>,
    },
}

// ── Outbound posts ──────────────────────────────────────────────────────────

/// Everything the transport needs to emit one logical post to a destination.
#[derive(Debug, Clone, Default)]
pub struct OutgoingPost {
    pub text: String,
    /// Locally staged replacement file, when a plugin produced one.
    pub file: Option<PathBuf>,
    /// Source items of a multi-item post, in delivery order. Empty for a
    /// plain single message.
    pub album: Vec<RawMessage>,
    /// Destination-local message id to thread this post under.
    pub reply_to: Option<MessageId>,
}

// ── Transport trait ─────────────────────────────────────────────────────────

/// Direction for history iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    OldestFirst,
    NewestFirst,
}

/// Stream of historical messages.
pub type HistoryStream<'a> = BoxStream<'a, Result<RawMessage>>;

/// Platform binding used by the sync engines.
///
/// Implementations must surface the platform's "retry after D" backoff as
/// [`Error::RateLimited`](crate::Error::RateLimited) so the engines can
/// distinguish it from fatal send failures. Live updates are delivered out
/// of band on an `mpsc` channel of [`ChatEvent`]s.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Iterate messages of `chat_id` with ids strictly greater than
    /// `after`, in the requested order.
    fn history(&self, chat_id: ChatId, after: MessageId, order: HistoryOrder)
    -> HistoryStream<'_>;

    /// Send one post, returning the destination message id it produced.
    async fn send(&self, chat_id: ChatId, post: &OutgoingPost) -> Result<MessageId>;

    /// Replace the text of an already sent message in place.
    async fn edit(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<()>;

    /// Delete a message by identity.
    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;
}
