// ============================================
// File: crates/wgdesk-core/src/render/mod.rs
// ============================================
//! # Configuration Renderer
//!
//! ## Creation Reason
//! Turns registry state into the two `wg-quick` config files that
//! matter: the server interface config and a peer's client config.
//!
//! ## Main Functionality
//! - [`server`]: `ServerConfigFile`, one `[Interface]` + a `[Peer]` per peer
//! - [`client`]: `ClientConfigFile`, the peer's `[Interface]` + the server
//!
//! ## Output Shape
//! ```text
//! [Interface]
//! Key = value          one line per field, fixed order
//! ...
//! <blank line>
//! [Peer]
//! ...
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Both renderers are pure `Display` impls
//! - Field order is fixed; diffs of the server file should only ever
//!   show the peers that changed
//!
//! ## Last Modified
//! v0.1.0 - Initial renderers

pub mod client;
pub mod server;

pub use client::ClientConfigFile;
pub use server::ServerConfigFile;

use crate::model::{Peer, ServerConfiguration};

/// MTU written into the server interface config.
pub const SERVER_MTU: u16 = 1450;

/// Renders the server interface config for `peers`, in iteration order.
#[must_use]
pub fn render_server_config(server: &ServerConfiguration, peers: &[Peer]) -> String {
    ServerConfigFile::new(server, peers).to_string()
}

/// Renders the client config handed to the owner of `peer`.
#[must_use]
pub fn render_client_config(server: &ServerConfiguration, peer: &Peer) -> String {
    ClientConfigFile::new(server, peer).to_string()
}
