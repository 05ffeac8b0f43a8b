use std::path::PathBuf;

use tracing::warn;

use {
    courier_channels::{FileKind, FileStager, OutgoingPost, RawMessage},
    courier_common::{GroupId, MessageId},
};

/// One logical forwardable item.
///
/// Built from a single raw message, mutated by each plugin in the chain,
/// and possibly merged with further raw messages of the same group before
/// it becomes forward-ready. Cleared (releasing any staged file exactly
/// once) after forwarding or rejection.
#[derive(Debug)]
pub struct MessageUnit {
    /// Text to forward; plugins rewrite this, merging concatenates captions
    /// into it.
    pub text: String,
    /// Unformatted source text, used for sentinel matching.
    pub raw_text: String,
    pub sender_id: Option<i64>,
    pub file_kind: FileKind,
    /// Replacement file staged by a plugin, released on [`Self::clear`].
    pub staged_file: Option<PathBuf>,
    /// Whether the staged file should be deleted on clear.
    pub cleanup: bool,
    /// Source message this one replies to, remapped per destination at
    /// forward time.
    pub reply_to: Option<MessageId>,
    group_id: Option<GroupId>,
    /// Subsequent same-group source messages, in delivery order.
    grouped: Vec<RawMessage>,
    /// Captions of trailing vetoed messages, spliced onto the unit that
    /// opens the next group.
    deferred_text: String,
    source: RawMessage,
}

impl MessageUnit {
    /// Build a unit from one raw message. The group id is fixed here and
    /// never changes afterwards.
    #[must_use]
    pub fn from_raw(raw: RawMessage) -> Self {
        Self {
            text: raw.text.clone(),
            raw_text: raw.raw_text.clone(),
            sender_id: raw.sender_id,
            file_kind: raw.file,
            staged_file: None,
            cleanup: false,
            reply_to: raw.reply_to,
            group_id: raw.group_id,
            grouped: Vec::new(),
            deferred_text: String::new(),
            source: raw,
        }
    }

    /// Group id assigned at construction; `None` means ungrouped.
    #[must_use]
    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    /// The raw message this unit was built from.
    #[must_use]
    pub fn source(&self) -> &RawMessage {
        &self.source
    }

    /// Id of the last source message consumed into this unit. This is what
    /// gets persisted as the forward offset.
    #[must_use]
    pub fn last_id(&self) -> MessageId {
        self.grouped.last().map_or(self.source.id, |m| m.id)
    }

    /// Number of physical source messages aggregated in this unit.
    #[must_use]
    pub fn item_count(&self) -> usize {
        1 + self.grouped.len()
    }

    /// Attach a plugin-produced replacement file.
    pub fn attach_file(&mut self, path: PathBuf, cleanup: bool) {
        self.staged_file = Some(path);
        self.cleanup = cleanup;
    }

    /// Absorb another raw message of the same group: the message joins the
    /// item list and its caption is concatenated onto the unit's text, so
    /// the final caption is complete no matter which sub-message carried it.
    pub fn merge(&mut self, raw: RawMessage) {
        if !raw.text.is_empty() {
            if self.text.is_empty() {
                self.text = raw.text.clone();
            } else {
                self.text.push('\n');
                self.text.push_str(&raw.text);
            }
        }
        self.grouped.push(raw);
    }

    /// Buffer the caption of a trailing vetoed message.
    pub fn push_deferred_text(&mut self, text: &str) {
        self.deferred_text.push_str(text);
    }

    /// Drain the deferred-text buffer.
    #[must_use]
    pub fn take_deferred_text(&mut self) -> String {
        std::mem::take(&mut self.deferred_text)
    }

    /// Splice deferred text inherited from the previous unit onto this one.
    pub fn splice_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.text.is_empty() {
            self.text = text.to_string();
        } else {
            self.text.push('\n');
            self.text.push_str(text);
        }
    }

    /// All physical source items of a multi-item post, in delivery order.
    /// Empty for a plain single message.
    #[must_use]
    pub fn album(&self) -> Vec<RawMessage> {
        if self.grouped.is_empty() {
            return Vec::new();
        }
        let mut items = Vec::with_capacity(self.item_count());
        items.push(self.source.clone());
        items.extend(self.grouped.iter().cloned());
        items
    }

    /// Shape this unit into a transport post. The per-destination reply
    /// target is filled in by the engine.
    #[must_use]
    pub fn to_post(&self, reply_to: Option<MessageId>) -> OutgoingPost {
        OutgoingPost {
            text: self.text.clone(),
            file: self.staged_file.clone(),
            album: self.album(),
            reply_to,
        }
    }

    /// Release the staged file, if any. Idempotent: the handle is taken on
    /// the first call, so cleanup runs at most once per unit. A failed
    /// cleanup is logged, never propagated.
    pub async fn clear(&mut self, stager: &dyn FileStager) {
        let Some(path) = self.staged_file.take() else {
            return;
        };
        if !self.cleanup {
            return;
        }
        if let Err(e) = stager.cleanup(&path).await {
            warn!(path = %path.display(), error = %e, "failed to remove staged file");
        }
    }
}
