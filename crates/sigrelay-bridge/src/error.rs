//! Bridge error types.

use sigrelay_types::error::ConfigError;
use thiserror::Error;

/// Error type for the bridge adapter.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Invalid or incomplete configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP exchange with the bridge failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The receive stream failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The bridge answered with a non-success status.
    #[error("Signal API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The bridge returned a payload of an unexpected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No session; `connect()` has not been called.
    #[error("Not connected")]
    NotConnected,

    /// The session was torn down while the request was in flight.
    #[error("Disconnected while request was in flight")]
    Disconnected,

    /// The event's target resolved to an empty address.
    #[error("No recipient for target '{0}'")]
    NoRecipient(String),
}

/// Alias for Result with BridgeError.
pub type BridgeResult<T> = Result<T, BridgeError>;
