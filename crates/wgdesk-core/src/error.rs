// ============================================
// File: crates/wgdesk-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Error types for key handling and address allocation.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include key material in error messages
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use wgdesk_common::CommonError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Key bytes or encoding are invalid.
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// What is wrong with the key
        reason: String,
    },

    /// A stored public key does not belong to the stored private key.
    #[error("Public key does not match private key")]
    KeyMismatch,

    /// Every candidate address in the pool is taken.
    #[error("Address pool {pool} exhausted ({capacity} addresses in use)")]
    PoolExhausted {
        /// Pool in CIDR notation
        pool: String,
        /// Number of assignable addresses in the pool
        capacity: u32,
    },

    /// Shared type error.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates an `InvalidKey` error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(err: base64::DecodeError) -> Self {
        Self::invalid_key(format!("base64 decode: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_exhausted_display() {
        let err = CoreError::PoolExhausted {
            pool: "10.0.0.0/30".into(),
            capacity: 1,
        };
        assert!(err.to_string().contains("10.0.0.0/30"));
    }
}
