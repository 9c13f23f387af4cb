//! Authenticated public-key encryption ("box").
//!
//! A box is keyed by (sender private key, receiver public key). The receiver opens
//! it with (sender public key, receiver private key); both sides reach the same
//! X25519 shared secret.
//!
//! ```text
//! shared = X25519(own_secret, peer_public)
//! key    = HKDF-SHA256(salt, shared, info = prefix || sender_pub || receiver_pub)
//! sealed = XChaCha20-Poly1305(key, nonce, plaintext)   // ciphertext || 16-byte tag
//! ```
//!
//! Nonces MUST NOT repeat for a given (sender, receiver) pair. Frames use
//! [`Nonce::generate`] for every message.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::SharedSecret;
use zeroize::Zeroize;

use crate::keys::{PublicKey, SecretKey, KEY_SIZE};
use crate::CryptoError;

/// XChaCha20 nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

const HKDF_SALT: &[u8] = b"sealpipe-box-v1";
const HKDF_INFO_PREFIX: &[u8] = b"sealpipe-frame-key";

/// A 24-byte per-frame nonce.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Draw a fresh nonce from the OS CSPRNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::Entropy(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Precomputed key for one direction of a connection.
///
/// Equivalent to calling [`seal`]/[`open`] with the raw keys, minus the
/// per-frame X25519 and HKDF work.
pub struct BoxKey {
    cipher: XChaCha20Poly1305,
}

impl BoxKey {
    /// Key for frames we send to `receiver`.
    pub fn for_sending(sender: &SecretKey, receiver: &PublicKey) -> Self {
        let shared = sender.diffie_hellman(receiver);
        Self::derive(&shared, &sender.public_key(), receiver)
    }

    /// Key for frames `sender` sends to us.
    pub fn for_receiving(sender: &PublicKey, receiver: &SecretKey) -> Self {
        let shared = receiver.diffie_hellman(sender);
        Self::derive(&shared, sender, &receiver.public_key())
    }

    fn derive(shared: &SharedSecret, sender: &PublicKey, receiver: &PublicKey) -> Self {
        let mut info = Vec::with_capacity(HKDF_INFO_PREFIX.len() + KEY_SIZE * 2);
        info.extend_from_slice(HKDF_INFO_PREFIX);
        info.extend_from_slice(sender.as_bytes());
        info.extend_from_slice(receiver.as_bytes());

        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared.as_bytes());
        let mut key_bytes = [0u8; KEY_SIZE];
        let Ok(()) = hk.expand(&info, &mut key_bytes) else {
            unreachable!("HKDF-SHA256 can always expand to 32 bytes");
        };

        let cipher = XChaCha20Poly1305::new((&key_bytes).into());
        key_bytes.zeroize();

        Self { cipher }
    }

    /// Encrypt `plaintext`. Output is `plaintext.len() + TAG_SIZE` bytes.
    pub fn seal(&self, plaintext: &[u8], nonce: &Nonce) -> Vec<u8> {
        let Ok(sealed) = self.cipher.encrypt(XNonce::from_slice(&nonce.0), plaintext) else {
            unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
        };
        sealed
    }

    /// Authenticate and decrypt `sealed`.
    ///
    /// # Errors
    ///
    /// - `Malformed`: input shorter than the tag
    /// - `Authentication`: tag mismatch (tamper, wrong key or wrong nonce)
    pub fn open(&self, sealed: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < TAG_SIZE {
            return Err(CryptoError::Malformed { len: sealed.len() });
        }

        self.cipher
            .decrypt(XNonce::from_slice(&nonce.0), sealed)
            .map_err(|_| CryptoError::Authentication)
    }
}

impl fmt::Debug for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxKey(..)")
    }
}

/// Seal `plaintext` from `sender` to `receiver`.
pub fn seal(plaintext: &[u8], nonce: &Nonce, sender: &SecretKey, receiver: &PublicKey) -> Vec<u8> {
    BoxKey::for_sending(sender, receiver).seal(plaintext, nonce)
}

/// Open a box sealed by `sender` for `receiver`.
pub fn open(
    sealed: &[u8],
    nonce: &Nonce,
    sender: &PublicKey,
    receiver: &SecretKey,
) -> Result<Vec<u8>, CryptoError> {
    BoxKey::for_receiving(sender, receiver).open(sealed, nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn test_real_keys_both_directions() {
        let bob = KeyPair::generate().unwrap();
        let alice = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();

        let bobs_box = seal(b"hi from bob", &nonce, bob.secret(), alice.public());
        let decrypted = open(&bobs_box, &nonce, bob.public(), alice.secret()).unwrap();
        assert_eq!(decrypted, b"hi from bob");

        let alices_box = seal(b"re from alice", &nonce, alice.secret(), bob.public());
        let decrypted = open(&alices_box, &nonce, alice.public(), bob.secret()).unwrap();
        assert_eq!(decrypted, b"re from alice");
    }

    #[test]
    fn test_seal_is_deterministic() {
        let sender = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();

        let a = seal(b"same input", &nonce, sender.secret(), receiver.public());
        let b = seal(b"same input", &nonce, sender.secret(), receiver.public());

        assert_eq!(a, b);
        assert_eq!(a.len(), b"same input".len() + TAG_SIZE);
    }

    #[test]
    fn test_precomputed_key_matches_one_shot() {
        let sender = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();

        let key = BoxKey::for_sending(sender.secret(), receiver.public());
        let sealed = key.seal(b"payload", &nonce);

        assert_eq!(
            sealed,
            seal(b"payload", &nonce, sender.secret(), receiver.public())
        );
        let opener = BoxKey::for_receiving(sender.public(), receiver.secret());
        assert_eq!(opener.open(&sealed, &nonce).unwrap(), b"payload");
    }

    #[test]
    fn test_any_bit_flip_fails_authentication() {
        let sender = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();
        let sealed = seal(b"tamper me", &nonce, sender.secret(), receiver.public());

        for byte in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                let result = open(&tampered, &nonce, sender.public(), receiver.secret());
                assert!(matches!(result, Err(CryptoError::Authentication)));
            }
        }
    }

    #[test]
    fn test_wrong_keys_fail() {
        let sender = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();
        let mallory = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();
        let sealed = seal(b"secret", &nonce, sender.secret(), receiver.public());

        assert!(matches!(
            open(&sealed, &nonce, mallory.public(), receiver.secret()),
            Err(CryptoError::Authentication)
        ));
        assert!(matches!(
            open(&sealed, &nonce, sender.public(), mallory.secret()),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_frame_cannot_be_reflected() {
        // A frame from alice to bob must not open as a frame from bob to alice.
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();
        let sealed = seal(b"ping", &nonce, alice.secret(), bob.public());

        assert!(matches!(
            open(&sealed, &nonce, bob.public(), alice.secret()),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let sender = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();
        let other = Nonce::generate().unwrap();
        let sealed = seal(b"secret", &nonce, sender.secret(), receiver.public());

        assert!(matches!(
            open(&sealed, &other, sender.public(), receiver.secret()),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_short_input_is_malformed() {
        let sender = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();

        for len in [0, 1, TAG_SIZE - 1] {
            let result = open(&vec![0u8; len], &nonce, sender.public(), receiver.secret());
            assert!(matches!(result, Err(CryptoError::Malformed { len: l }) if l == len));
        }
    }

    #[test]
    fn test_empty_plaintext_round_trip() {
        let sender = KeyPair::generate().unwrap();
        let receiver = KeyPair::generate().unwrap();
        let nonce = Nonce::generate().unwrap();
        let sealed = seal(b"", &nonce, sender.secret(), receiver.public());

        assert_eq!(sealed.len(), TAG_SIZE);
        assert!(open(&sealed, &nonce, sender.public(), receiver.secret())
            .unwrap()
            .is_empty());
    }
}
