//! Transport, handshake and server errors.

use sealpipe_crypto::CryptoError;
use thiserror::Error;

/// Errors from secure reads, writes and close.
///
/// All of them are terminal for the connection: there is no resynchronisation
/// after a bad frame or a torn write.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame, failed authentication or entropy failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The stream ended in the middle of a frame.
    #[error("stream ended mid-frame")]
    Truncated,

    #[error("connection closed")]
    Closed,
}

impl StreamError {
    /// Whether the peer sent something that was not a valid frame.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::Malformed { .. } | CryptoError::Authentication)
                | Self::FrameTooLarge { .. }
                | Self::Truncated
        )
    }
}

/// Errors while establishing a secure connection.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("invalid transport config: {0}")]
    Config(#[from] sealpipe_common::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("peer closed before sending a full public key")]
    PeerKeyTruncated,

    #[error("peer public key is a low-order point")]
    WeakPeerKey,

    #[error("peer public key does not match the pinned key")]
    PeerKeyMismatch,
}

/// Errors that stop a server's accept loop.
///
/// Per-connection failures never surface here; they end only their own task.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("server key generation failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("invalid transport config: {0}")]
    Config(#[from] sealpipe_common::Error),

    #[error("listener error: {0}")]
    Listener(#[source] std::io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

/// Why one server-side connection ended early.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("stream failed: {0}")]
    Stream(#[from] StreamError),
}
