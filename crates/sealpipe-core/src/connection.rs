//! Bidirectional secure stream.

use sealpipe_common::TransportConfig;
use sealpipe_crypto::{PublicKey, SecretKey};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::StreamError;
use crate::reader::SecureReader;
use crate::writer::SecureWriter;

type Halves<S> = (SecureReader<ReadHalf<S>>, SecureWriter<WriteHalf<S>>);

/// A [`SecureReader`] and [`SecureWriter`] over one stream, keyed by
/// (own private key, peer public key).
///
/// The connection owns the stream. [`close`](Self::close) shuts it down once;
/// afterwards every operation fails with [`StreamError::Closed`]. Dropping
/// without closing still releases the stream.
pub struct SecureConnection<S> {
    halves: Option<Halves<S>>,
    local_public: PublicKey,
    peer_public: PublicKey,
    max_plaintext_len: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SecureConnection<S> {
    pub fn new(
        stream: S,
        own_secret: &SecretKey,
        peer_public: PublicKey,
        config: &TransportConfig,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = SecureReader::with_config(read_half, own_secret, &peer_public, config);
        let writer = SecureWriter::with_config(write_half, own_secret, &peer_public, config);
        let max_plaintext_len = writer.max_plaintext_len();

        Self {
            halves: Some((reader, writer)),
            local_public: own_secret.public_key(),
            peer_public,
            max_plaintext_len,
        }
    }

    /// Read decrypted bytes. `Ok(0)` means the peer closed.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let (reader, _) = self.halves.as_mut().ok_or(StreamError::Closed)?;
        reader.read(buf).await
    }

    /// Seal `data` into one frame.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, StreamError> {
        let (_, writer) = self.halves.as_mut().ok_or(StreamError::Closed)?;
        writer.write(data).await
    }

    /// Shut the underlying stream down and release it.
    ///
    /// Only the first call touches the stream. Later calls return `Closed`.
    pub async fn close(&mut self) -> Result<(), StreamError> {
        let (reader, writer) = self.halves.take().ok_or(StreamError::Closed)?;
        let mut stream = reader.into_inner().unsplit(writer.into_inner());
        stream.shutdown().await?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.halves.is_none()
    }

    pub fn local_public_key(&self) -> &PublicKey {
        &self.local_public
    }

    pub fn peer_public_key(&self) -> &PublicKey {
        &self.peer_public
    }

    /// Largest plaintext one `write` accepts.
    pub fn max_plaintext_len(&self) -> usize {
        self.max_plaintext_len
    }

    /// Split into independently usable halves, e.g. for one task per direction.
    pub fn into_split(
        mut self,
    ) -> Result<(SecureReader<ReadHalf<S>>, SecureWriter<WriteHalf<S>>), StreamError> {
        self.halves.take().ok_or(StreamError::Closed)
    }
}
