//! Secure echo server.
//!
//! One key pair per listening endpoint, shared read-only by every connection.
//! Clients generate a fresh pair per dial, so all clients see the same server
//! key while each client's traffic stays unlinkable.

use std::future::Future;
use std::io::{self, ErrorKind};
use std::sync::Arc;

use sealpipe_common::TransportConfig;
use sealpipe_crypto::{KeyPair, PublicKey};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::connection::SecureConnection;
use crate::error::{ConnectionError, ServeError, StreamError};
use crate::handshake::respond;

/// Accepts connections and runs one echo task per connection.
#[derive(Clone)]
pub struct Server {
    keypair: Arc<KeyPair>,
    config: Arc<TransportConfig>,
}

impl Server {
    /// Create a server with a freshly generated key pair.
    pub fn new(config: TransportConfig) -> Result<Self, ServeError> {
        Self::with_keypair(KeyPair::generate()?, config)
    }

    pub fn with_keypair(keypair: KeyPair, config: TransportConfig) -> Result<Self, ServeError> {
        config.validate()?;
        Ok(Self {
            keypair: Arc::new(keypair),
            config: Arc::new(config),
        })
    }

    /// The key every client of this server receives in the handshake.
    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public()
    }

    /// Accept connections until the listener fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServeError> {
        self.serve_until(listener, std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves or the listener fails.
    ///
    /// An accept error caused by a single incoming connection is logged and
    /// skipped. Connections already running are left to finish on their own.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr().map_err(ServeError::Listener)?;
        info!("listening on {} with server key {}", local, self.keypair.public());
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) if is_connection_error(&e) => {
                    warn!("dropped incoming connection during accept: {}", e);
                    continue;
                }
                Err(e) => return Err(ServeError::Accept(e)),
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!("failed to set TCP_NODELAY for {}: {}", peer, e);
            }
            debug!("accepted connection from {}", peer);

            let keypair = Arc::clone(&self.keypair);
            let config = Arc::clone(&self.config);
            tokio::spawn(
                async move {
                    match handle_connection(stream, &keypair, &config).await {
                        Ok(echoed) => debug!("connection closed after echoing {} bytes", echoed),
                        Err(e) => warn!("connection failed: {}", e),
                    }
                }
                .instrument(info_span!("conn", %peer)),
            );
        }
    }
}

/// Accept failures that belong to one incoming connection, not the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset
    )
}

/// Start a server with a fresh key pair on `listener`.
pub async fn serve(listener: TcpListener, config: TransportConfig) -> Result<(), ServeError> {
    Server::new(config)?.serve(listener).await
}

/// Handshake, echo until the peer closes, then close.
///
/// The stream is released on every path: by `close` once the handshake has
/// succeeded, by drop if it fails.
pub async fn handle_connection<S>(
    stream: S,
    keypair: &KeyPair,
    config: &TransportConfig,
) -> Result<u64, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut conn = respond(stream, keypair, config).await?;

    let echoed = echo(&mut conn).await;
    let closed = conn.close().await;

    let echoed = echoed?;
    closed?;
    Ok(echoed)
}

/// Copy all decrypted input back out, re-encrypted, until end-of-stream.
///
/// Returns the number of plaintext bytes echoed.
pub async fn echo<S>(conn: &mut SecureConnection<S>) -> Result<u64, StreamError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; conn.max_plaintext_len()];
    let mut total = 0u64;

    loop {
        let n = conn.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        conn.write(&buf[..n]).await?;
        total += n as u64;
    }
}
