use courier_common::{AgentId, ChatId};

/// Crate-wide result type for configuration validation.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors. `MissingCredential` is the one fatal case: a
/// configured agent that cannot log in terminates the process with a
/// diagnostic; everything else in the system is contained per message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("agent {agent_id}: login type is bot but no bot token is set")]
    MissingCredential { agent_id: AgentId },

    #[error("forward spec for chat {chat_id} has no destinations")]
    NoDestinations { chat_id: ChatId },

    #[error("forward spec for chat {chat_id} references unknown plugin chain {chain}")]
    UnknownChain { chat_id: ChatId, chain: usize },
}
