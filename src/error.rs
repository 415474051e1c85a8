//! Error taxonomy for the voice/stream media transport.
//!
//! Public functions in this crate return `Result<T, VoiceError>` so callers
//! can match on kind. `anyhow` stays at the binary boundary, where several
//! fallible steps (config load, token validation, HTTP calls) are chained
//! with `.context(...)` and no caller needs to distinguish error kinds.

use thiserror::Error;

/// Errors surfaced by the voice/stream session machinery.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Bot-prefixed token, or an encryption mode name the encryptor doesn't know.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation that requires the session to be ready was called too early.
    #[error("session is not ready yet")]
    NotReady,

    /// IP discovery handshake mismatch, or a malformed signalling frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Websocket reset or UDP send failure.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The external transcoder producing encoded frames exited or errored.
    #[error("media source error: {0}")]
    Source(String),

    /// Websocket transport errors from tokio-tungstenite specifically.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A signalling frame failed to deserialize.
    #[error("malformed signalling frame: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VoiceError>;
