//! Error types for channel operations.
//!
//! Failures inside a single connection attempt are caught by the reconnect loop and retried.
//! Only [`ChannelError::RetriesExhausted`], a cancelled connect, or a failure local to the
//! caller (rotation, serialization) ever reach application code.

use authlink_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur while connecting, authenticating or exchanging messages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChannelError {
    /// The transport reported an error, before or after the handshake.
    ///
    /// # Example
    /// ```text
    /// Transport error: Connection refused (os error 111)
    /// ```
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport closed, either remotely or because it was torn down locally.
    #[error("Transport closed")]
    TransportClosed,

    /// The peer sent something other than the expected handshake message.
    ///
    /// Retried by the reconnect loop like any other transient failure.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// No `challenge_accepted` arrived within the handshake timeout.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// The password does not unlock the published identity.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(CryptoError),

    /// The reconnect loop gave up. `last` is the cause of the final failed attempt.
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of consecutive failed attempts.
        attempts: u32,
        /// Failure of the last attempt.
        last: Box<ChannelError>,
    },

    /// Credential rotation failed. The previous identity is still in effect.
    #[error(transparent)]
    Rotation(#[from] RotationError),

    /// `connect()` was called while a connection is already desired.
    #[error("Already connected")]
    AlreadyConnected,

    /// A pending `connect()` was cancelled by `disconnect()`.
    #[error("Disconnected")]
    Disconnected,

    /// The auth bundle could not be retrieved.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// An outbound message could not be serialized.
    #[error("Message serialization error: {0}")]
    Serialization(String),

    /// An inbound message on an active channel was not valid JSON.
    ///
    /// This is fatal to the connection: framing corruption invalidates trust in the stream.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::Serialization(err.to_string())
    }
}

#[cfg(feature = "websocket")]
impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChannelError::Transport(err.to_string())
    }
}

/// Errors from an in-band credential rotation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RotationError {
    /// The peer answered `set_auth_result` with `success: false`.
    #[error("Failed to set new password")]
    Rejected,

    /// No `set_auth_result` arrived in time.
    #[error("Set password timeout")]
    Timeout,

    /// Another rotation is still waiting for its result.
    #[error("A credential rotation is already in progress")]
    InProgress,

    /// The channel is not active. The request is never queued, so it cannot reach the peer
    /// after the caller has been told the rotation failed.
    #[error("Cannot change password while disconnected")]
    NotConnected,
}

/// Errors from retrieving the published auth bundle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No bundle has been published yet. A new one has to be created first.
    #[error("No auth bundle has been published")]
    NotFound,

    /// The request failed or returned an error status.
    #[error("Auth bundle request failed: {0}")]
    Http(String),

    /// The response was not a valid bundle.
    #[error("Invalid auth bundle: {0}")]
    InvalidBundle(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(err.to_string())
    }
}
