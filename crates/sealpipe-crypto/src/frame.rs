//! Frame layout.
//!
//! # Wire Format
//!
//! ```text
//! [0:24)  nonce, 24 random bytes
//! [24:)   ciphertext || 16-byte Poly1305 tag
//! ```
//!
//! A frame carries exactly one plaintext buffer. Stream-level framing (length
//! prefix or single read) is handled by the transport, not here.

use crate::sealed_box::{BoxKey, Nonce, NONCE_SIZE, TAG_SIZE};
use crate::CryptoError;

/// Bytes a frame adds on top of its plaintext (nonce + tag).
pub const FRAME_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// One sealed message: nonce plus authenticated ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub nonce: Nonce,
    pub sealed: Vec<u8>,
}

impl Frame {
    /// Seal `plaintext` under a freshly generated nonce.
    pub fn seal(key: &BoxKey, plaintext: &[u8]) -> Result<Self, CryptoError> {
        let nonce = Nonce::generate()?;
        let sealed = key.seal(plaintext, &nonce);
        Ok(Self { nonce, sealed })
    }

    /// Authenticate and decrypt this frame.
    pub fn open(&self, key: &BoxKey) -> Result<Vec<u8>, CryptoError> {
        key.open(&self.sealed, &self.nonce)
    }

    /// Encoded size on the wire.
    pub fn wire_len(&self) -> usize {
        NONCE_SIZE + self.sealed.len()
    }

    /// Append the encoded frame to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.wire_len());
        out.extend_from_slice(self.nonce.as_bytes());
        out.extend_from_slice(&self.sealed);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        self.encode_into(&mut out);
        out
    }

    /// Split raw bytes into nonce and sealed payload.
    ///
    /// Anything shorter than nonce + tag is `Malformed`; it never reaches the cipher.
    pub fn decode(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < FRAME_OVERHEAD {
            return Err(CryptoError::Malformed { len: bytes.len() });
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);

        Ok(Self {
            nonce: Nonce::from_bytes(nonce),
            sealed: bytes[NONCE_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn key_pair() -> (BoxKey, BoxKey) {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        (
            BoxKey::for_sending(a.secret(), b.public()),
            BoxKey::for_receiving(a.public(), b.secret()),
        )
    }

    #[test]
    fn test_frame_layout() {
        let (send, recv) = key_pair();
        let frame = Frame::seal(&send, b"hello world\n").unwrap();
        let wire = frame.encode();

        assert_eq!(wire.len(), NONCE_SIZE + 12 + TAG_SIZE);
        assert_eq!(&wire[..NONCE_SIZE], frame.nonce.as_bytes());

        let decoded = Frame::decode(&wire).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.open(&recv).unwrap(), b"hello world\n");
    }

    #[test]
    fn test_same_plaintext_gives_different_frames() {
        let (send, _) = key_pair();
        let a = Frame::seal(&send, b"hello world\n").unwrap().encode();
        let b = Frame::seal(&send, b"hello world\n").unwrap().encode();

        assert_ne!(a, b);
    }

    #[test]
    fn test_short_buffer_is_malformed() {
        for len in [0, 1, NONCE_SIZE, FRAME_OVERHEAD - 1] {
            let result = Frame::decode(&vec![0u8; len]);
            assert!(matches!(result, Err(CryptoError::Malformed { len: l }) if l == len));
        }
    }

    #[test]
    fn test_garbage_frame_fails_authentication() {
        let (_, recv) = key_pair();
        let frame = Frame::decode(&[0x42u8; FRAME_OVERHEAD + 8]).unwrap();

        assert!(matches!(frame.open(&recv), Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_tampered_nonce_fails_authentication() {
        let (send, recv) = key_pair();
        let mut wire = Frame::seal(&send, b"payload").unwrap().encode();
        wire[0] ^= 0x01;

        let frame = Frame::decode(&wire).unwrap();
        assert!(matches!(frame.open(&recv), Err(CryptoError::Authentication)));
    }
}
