//! Hub error types

use thiserror::Error;

/// Error type for hub operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    /// The worker task has stopped; no further commands are accepted
    #[error("fan-out hub is not running")]
    Closed,
}

/// Returned by a [`ViewerTransport`](super::ViewerTransport) whose peer is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("viewer transport closed")]
pub struct TransportClosed;
