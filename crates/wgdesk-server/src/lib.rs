// ============================================
// File: crates/wgdesk-server/src/lib.rs
// ============================================
//! # wgdesk Server Library
//!
//! ## Creation Reason
//! Owns everything stateful about a WireGuard peer desk: the settings
//! file, the durable registry document, the in-memory peer table and
//! the hand-off to the live interface.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: TOML settings
//! - [`registry`]: `PeerRegistry`, the only writer of peer state
//! - [`store`]: JSON registry document, atomic replace
//! - [`reload`]: `ReloadTrigger` seam and its adapters
//! - [`access`]: email / domain allowlist
//! - [`error`]: server error taxonomy
//!
//! ## Architecture Overview
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   caller (CLI / web layer)                 │
//! │                 owner identity + operation                 │
//! └──────────────────────────────┬─────────────────────────────┘
//!                                ▼
//! ┌─────────────┐      ┌──────────────────┐      ┌────────────┐
//! │  Settings   │─────►│   PeerRegistry   │─────►│  Registry  │
//! │   (TOML)    │      │ RwLock<State>    │      │   Store    │
//! └─────────────┘      └────────┬─────────┘      └────────────┘
//!                               │ rendered wg0.conf
//!                               ▼
//!                      ┌──────────────────┐
//!                      │  ReloadTrigger   │──► wg / wg-quick
//!                      └──────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One process per store file; there is no cross-process locking
//! - Owner identities are trusted as given; authenticate upstream
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod config;
pub mod error;
pub mod registry;
pub mod reload;
pub mod store;

// Re-export primary types
pub use access::AccessPolicy;
pub use config::Settings;
pub use error::{Result, ServerError};
pub use registry::{AddressAllocator, PeerRegistry};
pub use reload::{DisabledReloader, MemoryReloader, ReloadTrigger, WgQuickReloader};
pub use store::RegistryStore;
