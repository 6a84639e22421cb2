// ============================================
// File: crates/wgdesk-core/src/model.rs
// ============================================
//! # Registry Data Model
//!
//! ## Creation Reason
//! Typed records for the two things the registry knows about: the VPN
//! server itself and the peers registered against it.
//!
//! ## Main Functionality
//! - `Peer`: one registered endpoint, keyed by its tunnel address
//! - `NetworkSettings`: server parameters re-read from settings on load
//! - `HookScripts`: `wg-quick` lifecycle hook paths
//! - `ServerConfiguration`: server key pair + network settings
//!
//! ## Field Mutability
//! ```text
//! Peer.id / owner / keys  ── fixed at creation
//! Peer.name               ── changed only through rename()
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Peer` serializes with the registry document field names
//!   (`user` for the owner)
//! - A deserialized `Peer` is complete or rejected; there are no
//!   half-filled records
//!
//! ## Last Modified
//! v0.1.0 - Initial data model

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use wgdesk_common::{Ipv4Pool, PeerId};

use crate::crypto::{generate_keypair, generate_preshared_key, Key, KeyPair};

// ============================================
// Peer
// ============================================

/// A registered VPN peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Unique id, equal to the peer's tunnel address.
    id: PeerId,
    /// Optional display label.
    #[serde(default)]
    name: Option<String>,
    /// Identity (email) of the owning user.
    #[serde(rename = "user")]
    owner: String,
    /// Peer private key, handed to the user in the client config.
    private_key: Key,
    /// Peer public key, installed on the server.
    public_key: Key,
    /// Per-peer preshared key.
    preshared_key: Key,
}

impl Peer {
    /// Creates a peer from existing key material.
    #[must_use]
    pub fn new(
        id: PeerId,
        owner: impl Into<String>,
        name: Option<String>,
        keys: KeyPair,
        preshared_key: Key,
    ) -> Self {
        Self {
            id,
            name,
            owner: owner.into(),
            private_key: keys.private_key().clone(),
            public_key: keys.public_key().clone(),
            preshared_key,
        }
    }

    /// Creates a peer with freshly generated key material.
    #[must_use]
    pub fn generate(id: PeerId, owner: impl Into<String>, name: Option<String>) -> Self {
        Self::new(id, owner, name, generate_keypair(), generate_preshared_key())
    }

    /// Returns the peer id.
    #[must_use]
    pub const fn id(&self) -> PeerId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the owner identity.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns `true` if `owner` owns this peer.
    #[must_use]
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// Returns the private key.
    #[must_use]
    pub const fn private_key(&self) -> &Key {
        &self.private_key
    }

    /// Returns the public key.
    #[must_use]
    pub const fn public_key(&self) -> &Key {
        &self.public_key
    }

    /// Returns the preshared key.
    #[must_use]
    pub const fn preshared_key(&self) -> &Key {
        &self.preshared_key
    }

    /// Replaces the display name.
    pub fn rename(&mut self, name: Option<String>) {
        self.name = name;
    }
}

// ============================================
// HookScripts
// ============================================

/// `wg-quick` hook scripts referenced from the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookScripts {
    /// Run after the interface is brought up.
    pub post_up: PathBuf,
    /// Run before the interface is taken down.
    pub pre_down: PathBuf,
    /// Run after the interface is taken down.
    pub post_down: PathBuf,
}

impl Default for HookScripts {
    fn default() -> Self {
        Self {
            post_up: PathBuf::from("/data/postup.sh"),
            pre_down: PathBuf::from("/data/predown.sh"),
            post_down: PathBuf::from("/data/postdown.sh"),
        }
    }
}

impl HookScripts {
    /// Returns the three script paths in execution order.
    #[must_use]
    pub fn paths(&self) -> [&PathBuf; 3] {
        [&self.post_up, &self.pre_down, &self.post_down]
    }
}

// ============================================
// NetworkSettings
// ============================================

/// Server-wide network parameters.
///
/// These come from the settings file on every load and are never
/// stored in the registry document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Pool peer addresses are drawn from.
    pub pool: Ipv4Pool,
    /// Extra ranges advertised to clients besides the pool.
    pub allowed_ips: Vec<String>,
    /// DNS server pushed to clients.
    pub dns: Option<String>,
    /// Public hostname clients connect to.
    pub endpoint_host: String,
    /// UDP listen port.
    pub port: u16,
    /// Keepalive interval in seconds (0 disables).
    pub persistent_keepalive: u16,
    /// Lifecycle hook scripts.
    pub hooks: HookScripts,
}

impl NetworkSettings {
    /// Returns the DNS server, treating an empty string as unset.
    #[must_use]
    pub fn dns(&self) -> Option<&str> {
        self.dns
            .as_deref()
            .map(str::trim)
            .filter(|dns| !dns.is_empty())
    }
}

// ============================================
// ServerConfiguration
// ============================================

/// The VPN server's identity and network parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfiguration {
    /// Server key pair (persisted).
    pub keys: KeyPair,
    /// Network parameters (from settings).
    pub network: NetworkSettings,
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn test_peer_document_field_names() {
        let peer = Peer::generate(
            Ipv4Addr::new(10, 0, 0, 5).into(),
            "a@x.com",
            Some("laptop".into()),
        );
        let value = serde_json::to_value(&peer).unwrap();

        assert_eq!(value["id"], 167_772_165u32);
        assert_eq!(value["user"], "a@x.com");
        assert_eq!(value["name"], "laptop");
        assert!(value["private_key"].is_string());
        assert!(value["public_key"].is_string());
        assert!(value["preshared_key"].is_string());
    }

    #[test]
    fn test_peer_null_and_missing_name() {
        let peer = Peer::generate(PeerId::from_u32(7), "a@x.com", None);
        let mut value = serde_json::to_value(&peer).unwrap();
        assert!(value["name"].is_null());

        value.as_object_mut().unwrap().remove("name");
        let back: Peer = serde_json::from_value(value).unwrap();
        assert_eq!(back, peer);
    }

    #[test]
    fn test_peer_rejects_missing_required_field() {
        let peer = Peer::generate(PeerId::from_u32(7), "a@x.com", None);
        let mut value = serde_json::to_value(&peer).unwrap();
        value.as_object_mut().unwrap().remove("preshared_key");
        assert!(serde_json::from_value::<Peer>(value).is_err());
    }

    #[test]
    fn test_rename_only_touches_name() {
        let mut peer = Peer::generate(PeerId::from_u32(7), "a@x.com", None);
        let before = peer.clone();
        peer.rename(Some("phone".into()));

        assert_eq!(peer.name(), Some("phone"));
        assert_eq!(peer.id(), before.id());
        assert_eq!(peer.owner(), before.owner());
        assert_eq!(peer.public_key(), before.public_key());
    }

    #[test]
    fn test_blank_dns_is_unset() {
        let mut network = NetworkSettings {
            pool: "10.0.0.0/24".parse().unwrap(),
            allowed_ips: Vec::new(),
            dns: Some("  ".into()),
            endpoint_host: "vpn.example.com".into(),
            port: 51820,
            persistent_keepalive: 25,
            hooks: HookScripts::default(),
        };
        assert_eq!(network.dns(), None);

        network.dns = Some("1.1.1.1".into());
        assert_eq!(network.dns(), Some("1.1.1.1"));
    }
}
