use std::time::Duration;

use {
    courier_common::{AgentId, ChatId, MessageId},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, Result};

// ── Forwarding routes ───────────────────────────────────────────────────────

/// One source chat → destination chats route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardSpec {
    /// Chat to read from.
    pub source: ChatId,
    /// Chats to forward into, in fan-out order.
    pub destinations: Vec<ChatId>,
    /// Index of the plugin chain applied to this route.
    pub chain: usize,
    /// Last fully processed source message id; backlog sync resumes
    /// strictly after it.
    pub offset: MessageId,
    /// Optional end-of-range bound for backlog sync (inclusive).
    pub end: Option<MessageId>,
}

impl Default for ForwardSpec {
    fn default() -> Self {
        Self {
            source: ChatId(0),
            destinations: Vec::new(),
            chain: 0,
            offset: MessageId::ZERO,
            end: None,
        }
    }
}

impl ForwardSpec {
    /// Validate the route against the number of configured plugin chains.
    pub fn validate(&self, chain_count: usize) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(Error::NoDestinations {
                chat_id: self.source,
            });
        }
        if self.chain >= chain_count {
            return Err(Error::UnknownChain {
                chat_id: self.source,
                chain: self.chain,
            });
        }
        Ok(())
    }
}

// ── Plugin chains ───────────────────────────────────────────────────────────

/// One entry of a plugin chain: which plugin, with which parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    pub id: String,
    /// Free-form plugin parameters, passed to the factory untouched.
    #[serde(default)]
    pub params: serde_json::Value,
    /// Disabled entries stay in the config but are skipped when the chain
    /// is built.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Ordered plugin chain shared by one or more routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginChainConfig {
    /// Display name for logs and the admin surface.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

// ── Agents ──────────────────────────────────────────────────────────────────

/// Account type of a login identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Bot account. Cannot read chat history, so backlog sync refuses it.
    #[default]
    Bot,
    /// User account.
    User,
}

/// Live-mode flags for one agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    /// Editing a forwarded message to exactly this text deletes the
    /// destination copies and the source instead of editing them.
    pub delete_on_edit: Option<String>,
    /// Whether source deletions propagate to destination copies.
    pub delete_sync: bool,
    /// Ask the transport to deliver updates strictly in order.
    pub sequential_updates: bool,
}

/// Backlog-mode pacing for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklogSettings {
    /// Mandatory pause after each forwarded unit, in milliseconds.
    pub delay_ms: u64,
    /// How many times a per-chat pass is re-run while the previous pass
    /// still forwarded something.
    pub retry_budget: usize,
}

impl Default for BacklogSettings {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            retry_budget: 5,
        }
    }
}

impl BacklogSettings {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// One login identity with its per-mode settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub kind: AgentKind,
    /// Bot token; required when `kind` is [`AgentKind::Bot`].
    #[serde(serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,
    pub live: LiveSettings,
    pub backlog: BacklogSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: AgentKind::Bot,
            bot_token: Secret::new(String::new()),
            live: LiveSettings::default(),
            backlog: BacklogSettings::default(),
        }
    }
}

impl AgentConfig {
    /// Check that the agent can actually log in. Failing this is the one
    /// error that terminates the process.
    pub fn validate(&self, agent_id: AgentId) -> Result<()> {
        if self.kind == AgentKind::Bot && self.bot_token.expose_secret().is_empty() {
            return Err(Error::MissingCredential { agent_id });
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("kind", &self.kind)
            .field("bot_token", &"[REDACTED]")
            .field("live", &self.live)
            .field("backlog", &self.backlog)
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn default_true() -> bool {
    true
}
