/// Crate-wide result type for plugin resolution.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving configured chains. All of these surface at
/// configuration time, before any message is processed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown plugin id: {id}")]
    UnknownPlugin { id: String },

    #[error("plugin '{expected}' reported id '{actual}'")]
    IdMismatch { expected: String, actual: String },

    #[error("failed to construct plugin '{id}': {source}")]
    Construct {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}
