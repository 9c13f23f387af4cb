//! Cryptographic primitives for Sealpipe.
//!
//! This crate provides:
//! - X25519 key pairs generated from the OS CSPRNG
//! - A sealed box: authenticated public-key encryption keyed by
//!   (sender private key, receiver public key)
//! - The frame layout placed on the wire: `nonce || ciphertext+tag`
//!
//! # Design
//!
//! The box is X25519 → HKDF-SHA256 → XChaCha20-Poly1305. The HKDF info binds the
//! ordered (sender, receiver) public keys, so each direction of a connection is
//! keyed independently. Nonces are 24 random bytes per frame; the extended nonce
//! makes random generation safe without a counter.

#![forbid(unsafe_code)]

pub mod frame;
pub mod keys;
pub mod sealed_box;

use thiserror::Error;

pub use frame::{Frame, FRAME_OVERHEAD};
pub use keys::{KeyPair, PublicKey, SecretKey, KEY_SIZE};
pub use sealed_box::{open, seal, BoxKey, Nonce, NONCE_SIZE, TAG_SIZE};

/// Errors from key generation and frame sealing/opening.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The OS random source could not produce bytes.
    #[error("secure random source unavailable: {0}")]
    Entropy(String),

    /// Input is too short to hold a nonce and tag.
    #[error("malformed frame: {len} bytes")]
    Malformed { len: usize },

    /// Tag check failed: tampered data, wrong keys or wrong nonce.
    #[error("authentication failed")]
    Authentication,

    /// Key material could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}
