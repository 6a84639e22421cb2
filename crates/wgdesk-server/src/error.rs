// ============================================
// File: crates/wgdesk-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Error Classes
//! ```text
//! client error  NotFound, PeerLimitReached        → caller's fault, never retried
//! per-call      PoolExhausted, StoreWrite         → this call failed, process is fine
//! committed     ReloadFailed                      → state saved, daemon not synced
//! fatal         CorruptStore, ConfigLoad/Invalid  → refuse to serve
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial error taxonomy

use thiserror::Error;

use wgdesk_common::{CommonError, PeerId};
use wgdesk_core::CoreError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Peer {id} not found for owner '{owner}'")]
    NotFound {
        owner: String,
        id: PeerId,
    },

    #[error("Address {0} is already assigned")]
    DuplicateAddress(PeerId),

    #[error("Address pool {pool} exhausted ({capacity} addresses)")]
    PoolExhausted {
        pool: String,
        capacity: u32,
    },

    #[error("Owner '{owner}' already has {limit} peers")]
    PeerLimitReached {
        owner: String,
        limit: usize,
    },

    #[error("Registry store '{path}' is corrupt: {reason}")]
    CorruptStore {
        path: String,
        reason: String,
    },

    #[error("Failed to write registry store '{path}': {reason}")]
    StoreWrite {
        path: String,
        reason: String,
    },

    #[error("Reload failed: {reason}")]
    ReloadFailed {
        reason: String,
        /// Peer the saved change created, if any
        peer: Option<PeerId>,
    },

    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::PoolExhausted { pool, capacity } => Self::PoolExhausted { pool, capacity },
            CoreError::Common(e) => Self::Common(e),
            other => Self::Core(other),
        }
    }
}

impl ServerError {
    pub fn not_found(owner: impl Into<String>, id: PeerId) -> Self {
        Self::NotFound {
            owner: owner.into(),
            id,
        }
    }

    pub fn corrupt_store(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn store_write(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreWrite {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn reload_failed(reason: impl Into<String>) -> Self {
        Self::ReloadFailed {
            reason: reason.into(),
            peer: None,
        }
    }

    /// Records the peer a committed change created.
    #[must_use]
    pub fn with_peer(self, id: PeerId) -> Self {
        match self {
            Self::ReloadFailed { reason, .. } => Self::ReloadFailed {
                reason,
                peer: Some(id),
            },
            other => other,
        }
    }

    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Errors caused by the request itself rather than server state.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::PeerLimitReached { .. })
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Errors after which the process should not keep serving.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CorruptStore { .. } | Self::ConfigLoad { .. } | Self::ConfigInvalid { .. }
        )
    }

    /// The mutation was persisted even though the call failed.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::ReloadFailed { .. })
    }

    /// Peer created by a committed change whose reload failed.
    #[must_use]
    pub const fn committed_peer(&self) -> Option<PeerId> {
        match self {
            Self::ReloadFailed { peer, .. } => *peer,
            _ => None,
        }
    }
}
