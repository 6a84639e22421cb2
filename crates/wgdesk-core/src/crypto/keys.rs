// ============================================
// File: crates/wgdesk-core/src/crypto/keys.rs
// ============================================
//! # WireGuard Key Types
//!
//! ## Creation Reason
//! WireGuard identifies every endpoint by a Curve25519 key pair and
//! optionally hardens each tunnel with a symmetric preshared key. All
//! three are 32 raw bytes, written as standard base64 in config files
//! and in the registry document.
//!
//! ## Main Functionality
//! - `Key`: opaque 32-byte key, zeroed on drop, base64 text form
//! - `KeyPair`: private + public key, with a consistency check
//! - `generate_keypair()`, `generate_preshared_key()`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Debug` for `Key` is redacted; `Display` is the real base64 value
//!   and is only meant for config rendering
//! - Key equality is constant-time
//!
//! ## Last Modified
//! v0.1.0 - Initial key types

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use super::KEY_SIZE;
use crate::error::{CoreError, Result};

// ============================================
// Key
// ============================================

/// A 32-byte WireGuard key.
///
/// # Example
/// ```
/// use wgdesk_core::crypto::Key;
///
/// let key: Key = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".parse().unwrap();
/// assert_eq!(key.as_bytes(), &[0u8; 32]);
/// ```
#[derive(Clone)]
pub struct Key([u8; KEY_SIZE]);

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Key {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidKey` unless `bytes` is exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Returns the standard base64 encoding.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Treats this key as a private key and derives its public key.
    #[must_use]
    pub fn derive_public(&self) -> Key {
        let secret = StaticSecret::from(self.0);
        Key(PublicKey::from(&secret).to_bytes())
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key([REDACTED])")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl FromStr for Key {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = BASE64.decode(s.trim())?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }
}

impl Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================
// KeyPair
// ============================================

/// A Curve25519 private key together with its public key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    private_key: Key,
    public_key: Key,
}

impl KeyPair {
    /// Generates a fresh key pair from the OS random number generator.
    #[must_use]
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            private_key: Key(secret.to_bytes()),
            public_key: Key(public.to_bytes()),
        }
    }

    /// Builds a key pair from a private key, deriving the public half.
    #[must_use]
    pub fn from_private(private_key: Key) -> Self {
        let public_key = private_key.derive_public();
        Self {
            private_key,
            public_key,
        }
    }

    /// Builds a key pair from stored halves.
    ///
    /// # Errors
    /// Returns `KeyMismatch` if `public_key` was not derived from
    /// `private_key`.
    pub fn from_parts(private_key: Key, public_key: Key) -> Result<Self> {
        if private_key.derive_public() != public_key {
            return Err(CoreError::KeyMismatch);
        }
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Returns the private key.
    #[must_use]
    pub const fn private_key(&self) -> &Key {
        &self.private_key
    }

    /// Returns the public key.
    #[must_use]
    pub const fn public_key(&self) -> &Key {
        &self.public_key
    }

    /// Returns `true` if the public key belongs to the private key.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.private_key.derive_public() == self.public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key.to_base64())
            .finish_non_exhaustive()
    }
}

// ============================================
// Generators
// ============================================

/// Generates a fresh private/public key pair.
#[must_use]
pub fn generate_keypair() -> KeyPair {
    KeyPair::generate()
}

/// Generates a fresh preshared key.
#[must_use]
pub fn generate_preshared_key() -> Key {
    Key(StaticSecret::random_from_rng(OsRng).to_bytes())
}

// ============================================
// Tests
// ============================================
