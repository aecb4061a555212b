/// Error returned by a [`Bus`](crate::Bus) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),

    #[error("topic '{topic}' carries '{expected}', not '{actual}'")]
    TypeMismatch {
        topic: String,
        expected: String,
        actual: String,
    },

    #[error("subscription {0} is not active")]
    NotSubscribed(u64),

    #[error("bus closed")]
    Closed,
}

/// Error returned by a [`FrameTreeSource`](crate::FrameTreeSource).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameTreeError {
    /// The set of frames could not be enumerated at all.
    #[error("frame tree unavailable: {0}")]
    FrameTreeUnavailable(String),

    /// No valid chain currently links `child` to `parent`.
    #[error("no transform from '{child}' to '{parent}': {reason}")]
    TransformUnavailable {
        parent: String,
        child: String,
        reason: String,
    },
}

impl FrameTreeError {
    pub fn transform_unavailable(
        parent: impl Into<String>,
        child: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TransformUnavailable {
            parent: parent.into(),
            child: child.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned by a [`TransportSink`](crate::TransportSink).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("outbound queue full")]
    Full,

    #[error("transport closed")]
    Closed,

    #[error("encode: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e.to_string())
    }
}
