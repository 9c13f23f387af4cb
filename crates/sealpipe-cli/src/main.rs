//! Sealpipe CLI: key generation, secure echo server and client.

#![forbid(unsafe_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sealpipe_common::{Framing, TransportConfig};
use sealpipe_crypto::KeyPair;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sealpipe")]
#[command(about = "Authenticated-encryption transport over TCP")]
struct Args {
    /// JSON transport config file
    #[arg(long, global = true, env = "SEALPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Frame delimiting: length-prefixed or single-read
    #[arg(long, global = true)]
    framing: Option<Framing>,

    /// TCP connect timeout in milliseconds
    #[arg(long, global = true)]
    connect_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate and print a fresh X25519 key pair
    #[command(name = "generate-keys", visible_aliases = ["g", "gen"])]
    GenerateKeys,

    /// Run the secure echo server
    #[command(visible_alias = "c")]
    Listen {
        /// TCP port to listen on (all interfaces)
        port: u16,
    },

    /// Send one message to a server and print the echo
    Send {
        /// Server address (host:port)
        addr: String,
        message: String,
    },

    /// Show version information
    Version,
}

impl Args {
    fn transport_config(&self) -> Result<TransportConfig> {
        let base = match &self.config {
            Some(path) => TransportConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => TransportConfig::default(),
        };
        let mut config = base.apply_env()?;

        if let Some(framing) = self.framing {
            config.framing = framing;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    sealpipe_common::init_tracing();

    let args = Args::parse();

    match &args.command {
        Command::GenerateKeys => {
            let keypair = KeyPair::generate()?;
            println!("public:  {}", keypair.public());
            println!("private: {}", hex::encode(keypair.secret().to_bytes()));
        }
        Command::Listen { port } => {
            let config = args.transport_config()?;
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, *port));
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;
            info!("framing: {}", config.framing);

            let server = sealpipe_core::Server::new(config)?;
            server
                .serve_until(listener, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("failed to listen for ctrl-c: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
        }
        Command::Send { addr, message } => {
            let config = args.transport_config()?;
            let mut conn = sealpipe_core::dial(addr.as_str(), &config)
                .await
                .with_context(|| format!("failed to connect to {}", addr))?;

            conn.write(message.as_bytes()).await?;

            let mut echoed = Vec::with_capacity(message.len());
            let mut buf = vec![0u8; conn.max_plaintext_len()];
            while echoed.len() < message.len() {
                let n = conn.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                echoed.extend_from_slice(&buf[..n]);
            }
            conn.close().await?;

            println!("{}", String::from_utf8_lossy(&echoed));
        }
        Command::Version => {
            println!("sealpipe {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
