//! Raw public-key handshake.
//!
//! # Handshake Flow
//!
//! ```text
//! Initiator (Dial)                      Responder (Serve)
//!     |                                       |
//!     |  -> initiator public key (32 bytes)   |
//!     |-------------------------------------->|
//!     |                                       |
//!     |  <- responder public key (32 bytes)   |
//!     |<--------------------------------------|
//!     |                                       |
//!     [   SecureConnection(own secret, peer public)   ]
//! ```
//!
//! Both sides send before they receive, so neither waits on the other. Keys go
//! in the clear with no signature: the exchange protects later traffic from
//! passive observers and tampering, but a man in the middle can substitute keys
//! unless the dialer pins `expected_peer_key`.

use std::future::Future;
use std::io::{self, ErrorKind};
use std::time::Duration;

use sealpipe_common::TransportConfig;
use sealpipe_crypto::{KeyPair, PublicKey, KEY_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tracing::debug;

use crate::connection::SecureConnection;
use crate::error::HandshakeError;

/// Connect to `addr` with a fresh key pair and run the initiator handshake.
///
/// The TCP connect is bounded by `config.connect_timeout()`; there is no retry.
pub async fn dial<A: ToSocketAddrs>(
    addr: A,
    config: &TransportConfig,
) -> Result<SecureConnection<TcpStream>, HandshakeError> {
    config.validate()?;
    let keypair = KeyPair::generate()?;

    let stream = connect_within(config.connect_timeout(), TcpStream::connect(addr)).await?;
    stream.set_nodelay(true)?;

    initiate(stream, &keypair, config).await
}

async fn connect_within<T, F>(limit: Duration, connect: F) -> Result<T, HandshakeError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(limit, connect).await {
        Ok(connected) => Ok(connected?),
        Err(_) => Err(HandshakeError::ConnectTimeout(limit)),
    }
}

/// Initiator side of the handshake over an already-open stream.
pub async fn initiate<S>(
    mut stream: S,
    keypair: &KeyPair,
    config: &TransportConfig,
) -> Result<SecureConnection<S>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    config.validate()?;
    let peer = exchange_keys(&mut stream, keypair, config).await?;
    debug!("initiator handshake complete, peer key {}", peer);
    Ok(SecureConnection::new(stream, keypair.secret(), peer, config))
}

/// Responder side of the handshake over an accepted stream.
pub async fn respond<S>(
    mut stream: S,
    keypair: &KeyPair,
    config: &TransportConfig,
) -> Result<SecureConnection<S>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    config.validate()?;
    let peer = exchange_keys(&mut stream, keypair, config).await?;
    debug!("responder handshake complete, peer key {}", peer);
    Ok(SecureConnection::new(stream, keypair.secret(), peer, config))
}

async fn exchange_keys<S>(
    stream: &mut S,
    keypair: &KeyPair,
    config: &TransportConfig,
) -> Result<PublicKey, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(keypair.public().as_bytes()).await?;
    stream.flush().await?;

    let mut peer = [0u8; KEY_SIZE];
    stream
        .read_exact(&mut peer)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => HandshakeError::PeerKeyTruncated,
            _ => HandshakeError::Io(e),
        })?;
    let peer = PublicKey::from_bytes(peer);

    if let Some(expected) = &config.expected_peer_key {
        if PublicKey::from_hex(expected)? != peer {
            return Err(HandshakeError::PeerKeyMismatch);
        }
    }

    if !keypair.secret().agrees_with(&peer) {
        if !config.allow_weak_peer_keys {
            return Err(HandshakeError::WeakPeerKey);
        }
        debug!("accepting low-order peer key {}", peer);
    }

    Ok(peer)
}
