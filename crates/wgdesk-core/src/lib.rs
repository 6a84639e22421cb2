// ============================================
// File: crates/wgdesk-core/src/lib.rs
// ============================================
//! # wgdesk Core - Keys, Allocation & Config Rendering
//!
//! ## Creation Reason
//! Holds the pure building blocks of the peer registry: everything that
//! can be computed without touching disk or the WireGuard daemon.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - `Key`: 32-byte Curve25519 key, base64 on the wire
//! - `KeyPair`: private/public pair, consistency-checked on load
//! - `generate_keypair` / `generate_preshared_key`
//!
//! ### Model Module ([`model`])
//! - `Peer`: one registered endpoint (id, owner, name, keys)
//! - `ServerConfiguration`: server key pair plus `NetworkSettings`
//!
//! ### Allocator Module ([`allocator`])
//! - Random, bounded, collision-free address selection
//!
//! ### Render Module ([`render`])
//! - Server interface config (`wg0.conf`)
//! - Per-peer client config
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 wgdesk-server                       │
//! │                      │                              │
//! │                      ▼                              │
//! │                 wgdesk-core   ◄── You are here      │
//! │                      │                              │
//! │                      ▼                              │
//! │                wgdesk-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nothing in this crate performs I/O
//! - Rendered text is consumed by `wg-quick`; keep the grammar exact
//! - Private keys must never reach a log line
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocator;
pub mod crypto;
pub mod error;
pub mod model;
pub mod render;

pub use crypto::{generate_keypair, generate_preshared_key, Key, KeyPair};
pub use error::{CoreError, Result};
pub use model::{HookScripts, NetworkSettings, Peer, ServerConfiguration};
pub use render::{render_client_config, render_server_config};
