//! Crate-level error types for the push and pull collaborator seams.
//!
//! Neither error ever reaches an observer: pull failures degrade to an
//! empty snapshot and subscribe failures are retried, so these types only
//! cross the [`PushChannel`](crate::PushChannel) and
//! [`StateClient`](crate::StateClient) boundaries.

/// Error returned when opening a push subscription fails.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel could not establish the subscription.
    ///
    /// Carries the transport-level detail for logging. The store treats
    /// this as transient and retries with backoff.
    #[error("push channel unavailable: {0}")]
    Unavailable(String),

    /// The channel has been shut down and accepts no new subscriptions.
    #[error("push channel closed")]
    Closed,

    /// Underlying I/O failure while reaching the channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned when the one-shot state pull fails.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never reached the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend received the request but failed to answer it.
    #[error("remote call failed: {0}")]
    Remote(String),

    /// Underlying I/O failure while reaching the backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
