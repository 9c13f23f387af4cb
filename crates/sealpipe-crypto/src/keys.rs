//! X25519 key pairs.
//!
//! Key pairs are ephemeral: a client creates one per dial, a server creates one
//! per listening endpoint. Nothing is persisted.
//!
//! # Example
//!
//! ```
//! use sealpipe_crypto::KeyPair;
//!
//! let keypair = KeyPair::generate().unwrap();
//! println!("public key: {}", keypair.public());
//! ```

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use crate::CryptoError;

/// Size of public and private keys in bytes.
pub const KEY_SIZE: usize = 32;

/// A peer's X25519 public key.
///
/// Safe to share and log. Displayed as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Wrap raw key bytes as they arrive off the wire.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_SIZE,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub(crate) fn to_dalek(self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

/// An X25519 private key.
///
/// Zeroized on drop. `Debug` never prints key material.
#[derive(Clone)]
pub struct SecretKey(StaticSecret);

impl SecretKey {
    /// Create from raw private key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*x25519_dalek::PublicKey::from(&self.0).as_bytes())
    }

    /// Get the private key bytes.
    ///
    /// # Security
    /// Handle with care! These bytes decrypt every frame sent to this key.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Whether key agreement with `peer` is contributory.
    ///
    /// Low-order peer keys force an all-zero shared secret that anyone can compute.
    pub fn agrees_with(&self, peer: &PublicKey) -> bool {
        self.0.diffie_hellman(&peer.to_dalek()).was_contributory()
    }

    pub(crate) fn diffie_hellman(&self, peer: &PublicKey) -> x25519_dalek::SharedSecret {
        self.0.diffie_hellman(&peer.to_dalek())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// X25519 key pair.
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS CSPRNG.
    ///
    /// Fails only if the random source is unavailable. There is no fallback.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut seed = [0u8; KEY_SIZE];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| CryptoError::Entropy(e.to_string()))?;

        let secret = SecretKey::from_bytes(seed);
        seed.zeroize();

        Ok(Self::from_secret(secret))
    }

    /// Rebuild a key pair around an existing private key.
    pub fn from_secret(secret: SecretKey) -> Self {
        Self {
            public: secret.public_key(),
            secret,
        }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();

        assert_ne!(a.public(), b.public());
        assert_ne!(a.secret().to_bytes(), b.secret().to_bytes());
    }

    #[test]
    fn test_public_key_matches_secret() {
        let keypair = KeyPair::generate().unwrap();
        let restored = KeyPair::from_secret(SecretKey::from_bytes(keypair.secret().to_bytes()));

        assert_eq!(restored.public(), keypair.public());
    }

    #[test]
    fn test_public_key_hex() {
        let keypair = KeyPair::generate().unwrap();
        let encoded = keypair.public().to_string();

        assert_eq!(encoded.len(), 64);
        assert_eq!(PublicKey::from_hex(&encoded).unwrap(), *keypair.public());
    }

    #[test]
    fn test_public_key_hex_rejects_bad_input() {
        assert!(matches!(
            PublicKey::from_hex("abcd"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            PublicKey::from_hex("not hex"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = KeyPair::generate().unwrap();
        let secret_hex = hex::encode(keypair.secret().to_bytes());

        assert!(!format!("{:?}", keypair).contains(&secret_hex));
        assert!(!format!("{:?}", keypair.secret()).contains(&secret_hex));
    }

    #[test]
    fn test_zero_key_is_not_contributory() {
        let keypair = KeyPair::generate().unwrap();
        let peer = KeyPair::generate().unwrap();

        assert!(keypair.secret().agrees_with(peer.public()));
        assert!(!keypair
            .secret()
            .agrees_with(&PublicKey::from_bytes([0u8; KEY_SIZE])));
    }
}
