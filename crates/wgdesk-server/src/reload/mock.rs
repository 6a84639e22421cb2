// ============================================
// File: crates/wgdesk-server/src/reload/mock.rs
// ============================================
//! # In-Memory Reloader
//!
//! Records every config text it is handed instead of touching a real
//! interface, and can be switched into a failing mode to exercise the
//! `ReloadFailed` path.
//!
//! ## Last Modified
//! v0.1.0 - Initial test double

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::ReloadTrigger;
use crate::error::{Result, ServerError};

/// Reloader that keeps applied configs in memory.
///
/// # Example
/// ```
/// use wgdesk_server::reload::{MemoryReloader, ReloadTrigger};
///
/// # #[tokio::main]
/// # async fn main() {
/// let reloader = MemoryReloader::new();
/// reloader.apply("[Interface]\n").await.unwrap();
/// assert_eq!(reloader.take_applied(), vec!["[Interface]\n".to_string()]);
///
/// reloader.set_failing(true);
/// assert!(reloader.apply("[Interface]\n").await.is_err());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryReloader {
    /// Every text passed to `apply` or `up`, oldest first
    applied: Mutex<Vec<String>>,
    /// Whether the fake interface is up
    is_up: AtomicBool,
    /// Fail every call while set
    failing: AtomicBool,
}

impl MemoryReloader {
    /// Creates a reloader with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Takes all recorded config texts.
    ///
    /// This clears the record.
    #[must_use]
    pub fn take_applied(&self) -> Vec<String> {
        std::mem::take(&mut *self.applied.lock())
    }

    /// Returns the most recent config text.
    #[must_use]
    pub fn last_applied(&self) -> Option<String> {
        self.applied.lock().last().cloned()
    }

    /// Returns how many config texts have been recorded.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.lock().len()
    }

    /// Returns whether `up` was called more recently than `down`.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.is_up.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServerError::reload_failed("memory reloader set to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl ReloadTrigger for MemoryReloader {
    async fn apply(&self, server_config: &str) -> Result<()> {
        self.check()?;
        self.applied.lock().push(server_config.to_owned());
        Ok(())
    }

    async fn up(&self, server_config: &str) -> Result<()> {
        self.check()?;
        self.applied.lock().push(server_config.to_owned());
        self.is_up.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        self.check()?;
        self.is_up.store(false, Ordering::SeqCst);
        Ok(())
    }
}
