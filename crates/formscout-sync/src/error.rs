use thiserror::Error;

/// Failure of a single transport operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,

    #[error("peer unavailable: {0}")]
    Unavailable(String),

    /// The peer will never accept messages again (extension context gone,
    /// endpoint retired). Never retried.
    #[error("transport invalidated: {0}")]
    Invalidated(String),
}

impl TransportError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Invalidated(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel invalidated: {0}")]
    Invalidated(String),
}
