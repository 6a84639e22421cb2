// ============================================
// File: crates/wgdesk-core/src/render/server.rs
// ============================================
//! # Server Interface Config
//!
//! Rendered into the file `wg-quick` reads for the server interface
//! (typically `/etc/wireguard/wg0.conf`).
//!
//! ## Last Modified
//! v0.1.0 - Initial renderer

use std::fmt::{self, Write};

use super::SERVER_MTU;
use crate::model::{Peer, ServerConfiguration};

/// Display adapter producing the server interface config.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfigFile<'a> {
    server: &'a ServerConfiguration,
    peers: &'a [Peer],
}

impl<'a> ServerConfigFile<'a> {
    /// Creates a renderer over the server and its peers.
    #[must_use]
    pub const fn new(server: &'a ServerConfiguration, peers: &'a [Peer]) -> Self {
        Self { server, peers }
    }
}

impl fmt::Display for ServerConfigFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let network = &self.server.network;
        let hooks = &network.hooks;

        writeln!(f, "[Interface]")?;
        writeln!(f, "PrivateKey = {}", self.server.keys.private_key())?;
        writeln!(
            f,
            "Address = {}/{}",
            network.pool.host_address(),
            network.pool.prefix_len()
        )?;
        writeln!(f, "ListenPort = {}", network.port)?;
        writeln!(f, "MTU = {SERVER_MTU}")?;
        writeln!(f, "PostUp = {}", hooks.post_up.display())?;
        writeln!(f, "PreDown = {}", hooks.pre_down.display())?;
        writeln!(f, "PostDown = {}", hooks.post_down.display())?;
        writeln!(f, "Table = auto")?;

        for peer in self.peers {
            f.write_char('\n')?;
            writeln!(f, "[Peer]")?;
            writeln!(f, "PublicKey = {}", peer.public_key())?;
            writeln!(f, "PresharedKey = {}", peer.preshared_key())?;
            writeln!(f, "AllowedIPs = {}/32", peer.id())?;
            writeln!(f, "PersistentKeepalive = {}", network.persistent_keepalive)?;
        }

        Ok(())
    }
}
