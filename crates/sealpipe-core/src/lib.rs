//! Sealpipe secure transport.
//!
//! Layers authenticated encryption over any byte stream:
//!
//! 1. [`handshake`] exchanges raw X25519 public keys in the clear
//! 2. [`SecureWriter`] seals every `write` into one frame under a fresh nonce
//! 3. [`SecureReader`] reassembles frames and only returns authenticated plaintext
//! 4. [`SecureConnection`] pairs both over one stream and owns its close
//! 5. [`server`] accepts TCP connections, one task each, running an encrypted echo
//!
//! # Wire Format
//!
//! Handshake, once per connection, both sides send first then receive:
//! ```text
//! [32 bytes: public key]
//! ```
//!
//! After handshake, with the default length-prefixed framing:
//! ```text
//! [4 bytes: frame length, big-endian] [24 bytes: nonce] [ciphertext] [16 bytes: tag]
//! ```
//!
//! With single-read framing the length field is absent and each underlying read is
//! taken as one frame.
//!
//! # Trust model
//!
//! Keys are trusted on first exchange. Nothing proves who the peer is unless the
//! caller pins it with `expected_peer_key`.

#![forbid(unsafe_code)]

pub mod connection;
pub mod error;
pub mod handshake;
pub mod reader;
pub mod server;
pub mod writer;

pub use connection::SecureConnection;
pub use error::{ConnectionError, HandshakeError, ServeError, StreamError};
pub use handshake::{dial, initiate, respond};
pub use reader::SecureReader;
pub use server::{echo, handle_connection, serve, Server};
pub use writer::SecureWriter;

pub use sealpipe_common::config::LENGTH_PREFIX_SIZE;
pub use sealpipe_common::{Framing, TransportConfig};
