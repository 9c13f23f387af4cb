//! Transport configuration.
//!
//! Loaded from an optional JSON file, then overlaid with `SEALPIPE_*` environment
//! variables, then with CLI flags. Every field has a default, so an empty file
//! (or no file) is a valid configuration.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum encoded frame size (nonce + ciphertext + tag).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;
/// Size of the big-endian length field used by [`Framing::LengthPrefixed`].
pub const LENGTH_PREFIX_SIZE: usize = 4;
/// Default TCP connect timeout for dialing.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;

/// Smallest frame that can carry one byte of plaintext.
const MIN_MAX_FRAME_LEN: usize = 24 + 16 + 1;
/// Largest frame a reader will ever allocate for.
const MAX_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// How frames are delimited on the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// `u32` big-endian length before every frame; frames may span reads.
    #[default]
    LengthPrefixed,
    /// No prefix; one underlying read is exactly one frame.
    SingleRead,
}

impl Framing {
    /// Bytes of stream framing added before each frame.
    pub fn prefix_len(self) -> usize {
        match self {
            Self::LengthPrefixed => LENGTH_PREFIX_SIZE,
            Self::SingleRead => 0,
        }
    }
}

impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "length-prefixed" | "length" | "prefixed" => Ok(Self::LengthPrefixed),
            "single-read" | "single" => Ok(Self::SingleRead),
            other => Err(Error::config(format!("unknown framing mode: {other}"))),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthPrefixed => f.write_str("length-prefixed"),
            Self::SingleRead => f.write_str("single-read"),
        }
    }
}

/// Settings shared by dialers and servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub framing: Framing,
    /// Maximum encoded frame size, excluding the length prefix.
    pub max_frame_len: usize,
    pub connect_timeout_ms: u64,
    /// Accept peer keys that give a non-contributory shared secret (testing only).
    pub allow_weak_peer_keys: bool,
    /// Hex public key the peer must present; `None` trusts the first key seen.
    pub expected_peer_key: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            allow_weak_peer_keys: false,
            expected_peer_key: None,
        }
    }
}

impl TransportConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw).map_err(Error::serialization)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `SEALPIPE_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay variables from an arbitrary lookup.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup("SEALPIPE_FRAMING") {
            self.framing = value.parse()?;
        }
        if let Some(value) = lookup("SEALPIPE_MAX_FRAME_LEN") {
            self.max_frame_len = value
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("SEALPIPE_MAX_FRAME_LEN: {e}")))?;
        }
        if let Some(value) = lookup("SEALPIPE_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = value
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("SEALPIPE_CONNECT_TIMEOUT_MS: {e}")))?;
        }
        if let Some(value) = lookup("SEALPIPE_ALLOW_WEAK_PEER_KEYS") {
            self.allow_weak_peer_keys = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(value) = lookup("SEALPIPE_EXPECTED_PEER_KEY") {
            self.expected_peer_key = Some(value.trim().to_string());
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_MAX_FRAME_LEN..=MAX_MAX_FRAME_LEN).contains(&self.max_frame_len) {
            return Err(Error::config(format!(
                "max_frame_len must be between {} and {}, got {}",
                MIN_MAX_FRAME_LEN, MAX_MAX_FRAME_LEN, self.max_frame_len
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::config("connect_timeout_ms must be non-zero"));
        }
        if let Some(key) = &self.expected_peer_key {
            if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::config(
                    "expected_peer_key must be 64 hex characters",
                ));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();

        assert_eq!(config.framing, Framing::LengthPrefixed);
        assert_eq!(config.max_frame_len, 65536);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert!(!config.allow_weak_peer_keys);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_framing_parse() {
        assert_eq!("single-read".parse::<Framing>().unwrap(), Framing::SingleRead);
        assert_eq!(
            "Length-Prefixed".parse::<Framing>().unwrap(),
            Framing::LengthPrefixed
        );
        assert!("bogus".parse::<Framing>().is_err());
        assert_eq!(Framing::SingleRead.to_string(), "single-read");
        assert_eq!(Framing::LengthPrefixed.prefix_len(), LENGTH_PREFIX_SIZE);
        assert_eq!(Framing::SingleRead.prefix_len(), 0);
    }

    #[test]
    fn test_json_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "framing": "single-read", "connect_timeout_ms": 500 }}"#).unwrap();

        let config = TransportConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.framing, Framing::SingleRead);
        assert_eq!(config.connect_timeout_ms, 500);
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }

    #[test]
    fn test_json_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        assert!(matches!(
            TransportConfig::from_json_file(file.path()),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_env_overlay() {
        let config = TransportConfig::default()
            .apply_env_from(env(&[
                ("SEALPIPE_FRAMING", "single"),
                ("SEALPIPE_MAX_FRAME_LEN", "4096"),
                ("SEALPIPE_ALLOW_WEAK_PEER_KEYS", "yes"),
            ]))
            .unwrap();

        assert_eq!(config.framing, Framing::SingleRead);
        assert_eq!(config.max_frame_len, 4096);
        assert!(config.allow_weak_peer_keys);
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let result = TransportConfig::default()
            .apply_env_from(env(&[("SEALPIPE_CONNECT_TIMEOUT_MS", "soon")]));
        assert!(matches!(result, Err(Error::Config(_))));

        let result =
            TransportConfig::default().apply_env_from(env(&[("SEALPIPE_MAX_FRAME_LEN", "16")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_expected_peer_key_must_be_hex() {
        let config = TransportConfig {
            expected_peer_key: Some("zz".repeat(32)),
            ..TransportConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TransportConfig {
            expected_peer_key: Some("ab".repeat(32)),
            ..TransportConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
