// ============================================
// File: crates/wgdesk-core/src/render/client.rs
// ============================================
//! # Client Config
//!
//! The file a user downloads and imports into their WireGuard client.
//!
//! ## Last Modified
//! v0.1.0 - Initial renderer

use std::fmt;
use std::net::Ipv6Addr;

use crate::model::{Peer, ServerConfiguration};

/// Display adapter producing a peer's client config.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfigFile<'a> {
    server: &'a ServerConfiguration,
    peer: &'a Peer,
}

impl<'a> ClientConfigFile<'a> {
    /// Creates a renderer for one peer.
    #[must_use]
    pub const fn new(server: &'a ServerConfiguration, peer: &'a Peer) -> Self {
        Self { server, peer }
    }
}

impl fmt::Display for ClientConfigFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let network = &self.server.network;

        writeln!(f, "[Interface]")?;
        writeln!(f, "PrivateKey = {}", self.peer.private_key())?;
        writeln!(f, "Address = {}/32", self.peer.id())?;
        if let Some(dns) = network.dns() {
            writeln!(f, "DNS = {dns}")?;
        }

        writeln!(f)?;
        writeln!(f, "[Peer]")?;
        writeln!(f, "PublicKey = {}", self.server.keys.public_key())?;
        writeln!(f, "PresharedKey = {}", self.peer.preshared_key())?;
        write!(f, "AllowedIPs = {}", network.pool)?;
        for range in &network.allowed_ips {
            write!(f, ", {range}")?;
        }
        writeln!(f)?;
        writeln!(f, "Endpoint = {}", Endpoint(&network.endpoint_host, network.port))?;
        writeln!(f, "PersistentKeepalive = {}", network.persistent_keepalive)?;

        Ok(())
    }
}

/// `host:port`, with IPv6 literals in brackets.
struct Endpoint<'a>(&'a str, u16);

impl fmt::Display for Endpoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(host, port) = *self;
        if host.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{host}]:{port}")
        } else {
            write!(f, "{host}:{port}")
        }
    }
}
