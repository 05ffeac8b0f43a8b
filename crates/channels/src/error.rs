use std::{error::Error as StdError, time::Duration};

use courier_common::{ChatId, MessageId};

/// Crate-wide result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed transport errors shared across the channel traits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The platform asked us to back off. Recoverable: sleep for
    /// `retry_after`, then retry the same call at the same position.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// A requested chat is not reachable with the current login.
    #[error("unknown chat: {chat_id}")]
    UnknownChat { chat_id: ChatId },

    /// A referenced message no longer exists on the platform.
    #[error("message not found: {chat_id}/{message_id}")]
    NotFound {
        chat_id: ChatId,
        message_id: MessageId,
    },

    /// Wrapped source error from the platform binding.
    #[error("transport operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Local file I/O failed (staged media).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    #[must_use]
    pub fn unknown_chat(chat_id: ChatId) -> Self {
        Self::UnknownChat { chat_id }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Backoff duration when this error is the platform's rate-limit signal,
    /// `None` for every other (non-recoverable) error.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
