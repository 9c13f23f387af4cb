//! Opening side of the secure transport.

use std::io::ErrorKind;

use bytes::BytesMut;
use sealpipe_common::{Framing, TransportConfig};
use sealpipe_crypto::{BoxKey, CryptoError, Frame, PublicKey, SecretKey, FRAME_OVERHEAD};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::error::StreamError;
use crate::LENGTH_PREFIX_SIZE;

/// Reads frames from the underlying stream and yields authenticated plaintext.
///
/// Only plaintext that passed the tag check is ever copied into a caller's
/// buffer. If a frame's plaintext is larger than the buffer, the rest is kept
/// and returned by the following reads.
pub struct SecureReader<R> {
    inner: R,
    key: BoxKey,
    framing: Framing,
    max_frame_len: usize,
    staging: Vec<u8>,
    pending: BytesMut,
}

impl<R: AsyncRead + Unpin> SecureReader<R> {
    /// Create a reader with default framing.
    pub fn new(inner: R, own_secret: &SecretKey, peer_public: &PublicKey) -> Self {
        Self::with_config(inner, own_secret, peer_public, &TransportConfig::default())
    }

    pub fn with_config(
        inner: R,
        own_secret: &SecretKey,
        peer_public: &PublicKey,
        config: &TransportConfig,
    ) -> Self {
        Self {
            inner,
            key: BoxKey::for_receiving(peer_public, own_secret),
            framing: config.framing,
            max_frame_len: config.max_frame_len,
            staging: vec![0u8; config.max_frame_len],
            pending: BytesMut::new(),
        }
    }

    /// Read decrypted bytes into `buf`.
    ///
    /// Returns `Ok(0)` only at end-of-stream (or for an empty `buf`).
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }

        // Frames with an empty plaintext carry nothing; skip them.
        while self.pending.is_empty() {
            match self.read_frame().await? {
                Some(plaintext) => self.pending.extend_from_slice(&plaintext),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }

    /// Read and open exactly one frame.
    ///
    /// Returns `None` on a clean end-of-stream at a frame boundary. Bytes left
    /// over from an earlier [`read`](Self::read) are not returned here.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        let wire_len = match self.framing {
            Framing::LengthPrefixed => self.fill_length_prefixed().await?,
            Framing::SingleRead => self.fill_single_read().await?,
        };
        let Some(wire_len) = wire_len else {
            return Ok(None);
        };

        let frame = Frame::decode(&self.staging[..wire_len])?;
        let plaintext = frame.open(&self.key)?;

        trace!(wire = wire_len, plaintext = plaintext.len(), "opened frame");
        Ok(Some(plaintext))
    }

    /// Buffer one length-prefixed frame into `staging`, looping over short reads.
    async fn fill_length_prefixed(&mut self) -> Result<Option<usize>, StreamError> {
        let mut header = [0u8; LENGTH_PREFIX_SIZE];
        let mut filled = 0;
        while filled < header.len() {
            let n = self.inner.read(&mut header[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(StreamError::Truncated);
            }
            filled += n;
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_frame_len {
            return Err(StreamError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if len < FRAME_OVERHEAD {
            return Err(CryptoError::Malformed { len }.into());
        }

        self.inner
            .read_exact(&mut self.staging[..len])
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => StreamError::Truncated,
                _ => StreamError::Io(e),
            })?;

        Ok(Some(len))
    }

    /// Take exactly one underlying read as one frame.
    async fn fill_single_read(&mut self) -> Result<Option<usize>, StreamError> {
        let n = self.inner.read(&mut self.staging).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(n))
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
