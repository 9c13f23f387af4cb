//! Sealing side of the secure transport.

use bytes::BufMut;
use sealpipe_common::{Framing, TransportConfig};
use sealpipe_crypto::{BoxKey, Frame, PublicKey, SecretKey, FRAME_OVERHEAD};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::StreamError;

/// Seals each `write` into one frame and sends it on the underlying stream.
///
/// Every frame gets a fresh random nonce. Frames are never batched: one call,
/// one underlying `write_all`. If that write fails part-way the stream's framing
/// is lost and the caller must abort the connection.
pub struct SecureWriter<W> {
    inner: W,
    key: BoxKey,
    framing: Framing,
    max_frame_len: usize,
    wire: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> SecureWriter<W> {
    /// Create a writer with default framing.
    pub fn new(inner: W, own_secret: &SecretKey, peer_public: &PublicKey) -> Self {
        Self::with_config(inner, own_secret, peer_public, &TransportConfig::default())
    }

    pub fn with_config(
        inner: W,
        own_secret: &SecretKey,
        peer_public: &PublicKey,
        config: &TransportConfig,
    ) -> Self {
        Self {
            inner,
            key: BoxKey::for_sending(own_secret, peer_public),
            framing: config.framing,
            max_frame_len: config.max_frame_len,
            wire: Vec::with_capacity(config.framing.prefix_len() + config.max_frame_len),
        }
    }

    /// Largest plaintext a single `write` accepts.
    ///
    /// Zero when `max_frame_len` cannot hold the frame overhead.
    pub fn max_plaintext_len(&self) -> usize {
        self.max_frame_len.saturating_sub(FRAME_OVERHEAD)
    }

    /// Seal `plaintext` into one frame and send it.
    ///
    /// Returns the number of plaintext bytes written. An empty buffer is a
    /// no-op: no frame is sent, so a zero-length read always means end-of-stream.
    pub async fn write(&mut self, plaintext: &[u8]) -> Result<usize, StreamError> {
        if plaintext.is_empty() {
            return Ok(0);
        }
        if plaintext.len() > self.max_plaintext_len() {
            return Err(StreamError::FrameTooLarge {
                len: plaintext.len() + FRAME_OVERHEAD,
                max: self.max_frame_len,
            });
        }

        let frame = Frame::seal(&self.key, plaintext)?;
        let wire_len = frame.wire_len();

        self.wire.clear();
        if self.framing == Framing::LengthPrefixed {
            let prefix = u32::try_from(wire_len).map_err(|_| StreamError::FrameTooLarge {
                len: wire_len,
                max: u32::MAX as usize,
            })?;
            self.wire.put_u32(prefix);
        }
        frame.encode_into(&mut self.wire);

        self.inner.write_all(&self.wire).await?;
        self.inner.flush().await?;

        trace!(
            plaintext = plaintext.len(),
            wire = self.wire.len(),
            "sent frame"
        );
        Ok(plaintext.len())
    }

    /// Flush and shut down the write direction.
    pub async fn shutdown(&mut self) -> Result<(), StreamError> {
        self.inner.shutdown().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
