// ============================================
// File: crates/wgdesk-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Wraps Curve25519 key generation behind opaque 32-byte keys. The
//! registry never inspects key contents; it only stores and renders them.
//!
//! ## Main Functionality
//! - [`keys`]: `Key`, `KeyPair` and the two generators
//!
//! ## ⚠️ Important Note for Next Developer
//! - Uses x25519-dalek; NEVER roll your own primitives
//! - Generation draws from the OS RNG and has no error path
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto wrapper

pub mod keys;

pub use keys::{generate_keypair, generate_preshared_key, Key, KeyPair};

/// Size of a WireGuard key (private, public or preshared) in bytes.
pub const KEY_SIZE: usize = 32;
