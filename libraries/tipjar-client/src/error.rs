//! Error types for the tipjar client.

use std::time::Duration;
use tipjar_core::wire::DecodeError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the tipjar client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The TCP session could not be established or broke mid-exchange.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the session, or it was disposed locally while
    /// calls were still pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// A received frame violated the wire contract. The session is torn
    /// down; nothing after the malformed frame can be trusted.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] DecodeError),

    /// No response arrived within the per-call window.
    #[error("call timed out after {after:?}")]
    Timeout {
        /// The window that elapsed.
        after: Duration,
    },

    /// The server holds no record under the requested id.
    #[error("user {id} not found")]
    NotFound {
        /// The id that was requested.
        id: i32,
    },

    /// The server reported a failure executing the request.
    #[error("server error: {message}")]
    Server {
        /// The server's failure text.
        message: String,
    },

    /// The configured endpoint is not a usable `tcp://host:port` URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The operation is not valid in the client's current lifecycle
    /// state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl ClientError {
    /// Whether this error ends the session it occurred on.
    ///
    /// Fatal errors leave the client disconnected; everything else leaves
    /// the session usable for further calls.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ConnectionClosed | Self::MalformedFrame(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
