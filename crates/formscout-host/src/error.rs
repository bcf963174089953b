use std::time::Duration;

use thiserror::Error;

/// A page snapshot could not be taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The document is not ready yet (still loading, mid-mutation).
    #[error("page not ready: {0}")]
    NotReady(String),

    #[error("page unreadable: {0}")]
    Unreadable(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("page agent has stopped")]
    Stopped,

    #[error("message has no direct reply")]
    NoReply,

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}
