use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broker unreachable at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Broker I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Broker rejected message: {0}")]
    Rejected(String),

    #[error("Broker closed the connection")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PublishError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn frame_too_large(size: usize) -> Self {
        Self::Protocol(format!(
            "frame body of {size} bytes exceeds limit of {} bytes",
            crate::frame::MAX_FRAME_BODY
        ))
    }

    /// Whether the broker actively refused the write (as opposed to being
    /// unreachable).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
