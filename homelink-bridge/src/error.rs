use thiserror::Error;

/// Everything that can go wrong inside the bridge. Nothing here is fatal to
/// the hosting process; callers surface these as ordinary error responses.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Broker unreachable, misconfigured, or transport not connected.
    #[error("connection error: {0}")]
    Connection(String),

    /// Invalid relay number or action, rejected before any publish.
    #[error("validation error: {0}")]
    Validation(String),

    /// Publish failed or timed out at the transport layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed payload, inbound or outbound.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// A sync was requested with no schedule provider registered.
    #[error("no pending-schedule provider registered")]
    MissingProvider,
}
