use bridge_api::BusError;

/// Failure to set up a receiver. Fatal to the construction that raised it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("receiver '{0}' is already registered")]
    NameCollision(String),

    #[error("subscribe '{topic}' ({msg_type}): {source}")]
    Subscribe {
        topic: String,
        msg_type: String,
        #[source]
        source: BusError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("registration: {0}")]
    Registration(#[from] RegistrationError),

    #[error("transport: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Prepend context to the message of string-carrying variants.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            EngineError::Transport(msg) => EngineError::Transport(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}
