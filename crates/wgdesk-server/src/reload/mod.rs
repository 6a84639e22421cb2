// ============================================
// File: crates/wgdesk-server/src/reload/mod.rs
// ============================================
//! # Reload Trigger
//!
//! ## Creation Reason
//! The registry decides *when* the live interface must change and what
//! its config text is; actually touching the daemon happens behind this
//! trait so the registry can be driven without root or WireGuard tools.
//!
//! ## Main Functionality
//! - `ReloadTrigger`: apply / up / down
//! - [`WgQuickReloader`]: real adapter over `wg` and `wg-quick`
//! - [`DisabledReloader`]: accepts everything, touches nothing
//! - [`MemoryReloader`]: records calls for tests
//!
//! ## Flow
//! ```text
//! PeerRegistry ── mutation ── persist ── render ──► ReloadTrigger::apply(text)
//!                                                        │
//!                                          Ok / ReloadFailed (state already saved)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations report every failure as `ReloadFailed`
//! - `apply` is called with the registry write lock held; keep it bounded
//!
//! ## Last Modified
//! v0.1.0 - Initial reload seam

mod mock;
mod wg_quick;

pub use mock::MemoryReloader;
pub use wg_quick::WgQuickReloader;

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

// ============================================
// ReloadTrigger Trait
// ============================================

/// Pushes rendered server config text to the live interface.
#[async_trait]
pub trait ReloadTrigger: Send + Sync {
    /// Writes `server_config` and syncs the running interface to it
    /// without dropping sessions.
    ///
    /// # Errors
    /// Returns `ReloadFailed` if the write or the sync fails or times out.
    async fn apply(&self, server_config: &str) -> Result<()>;

    /// Writes `server_config` and brings the interface up.
    ///
    /// # Errors
    /// Returns `ReloadFailed` if the interface cannot be started.
    async fn up(&self, server_config: &str) -> Result<()>;

    /// Brings the interface down.
    ///
    /// # Errors
    /// Returns `ReloadFailed` if the interface cannot be stopped.
    async fn down(&self) -> Result<()>;
}

// ============================================
// DisabledReloader
// ============================================

/// Reloader used when `[reload] enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledReloader;

#[async_trait]
impl ReloadTrigger for DisabledReloader {
    async fn apply(&self, server_config: &str) -> Result<()> {
        info!(
            "Reload disabled, skipping sync ({} bytes of config)",
            server_config.len()
        );
        Ok(())
    }

    async fn up(&self, _server_config: &str) -> Result<()> {
        info!("Reload disabled, not bringing interface up");
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        info!("Reload disabled, not bringing interface down");
        Ok(())
    }
}
