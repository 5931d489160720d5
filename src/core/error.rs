use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackboneError {
    #[error("Agent already exists: {0}")]
    DuplicateAgent(crate::core::types::AgentId),

    #[error("Agent id {0} is reserved for broadcast events")]
    ReservedAgentId(crate::core::types::AgentId),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Component {0} is not bound to an agent")]
    NotBound(String),

    #[error("Failed to construct component {component}: {reason}")]
    Construction { component: String, reason: String },

    #[error("Invalid state for component {component}: {source}")]
    StateMismatch {
        component: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Handler busy: {0} is already borrowed")]
    HandlerBusy(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackboneError>;
