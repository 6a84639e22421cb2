// ============================================
// File: crates/wgdesk-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Parsing failures for the shared types. Higher crates wrap
//! `CommonError` transparently in their own error enums.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Common error types shared across wgdesk crates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// A CIDR string could not be parsed into a pool.
    #[error("Invalid CIDR '{input}': {reason}")]
    InvalidCidr {
        /// The rejected input
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// A peer identifier was neither a dotted IPv4 address nor an integer.
    #[error("Invalid peer id '{input}': expected IPv4 address or integer")]
    InvalidPeerId {
        /// The rejected input
        input: String,
    },
}

impl CommonError {
    /// Creates an `InvalidCidr` error.
    pub fn invalid_cidr(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCidr {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_cidr("10.0.0.0/33", "prefix length cannot exceed 32");
        assert!(err.to_string().contains("10.0.0.0/33"));
        assert!(err.to_string().contains("exceed 32"));
    }
}
