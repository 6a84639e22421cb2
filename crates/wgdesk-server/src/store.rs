// ============================================
// File: crates/wgdesk-server/src/store.rs
// ============================================
//! # Registry Store
//!
//! ## Creation Reason
//! The registry's only durable state is one JSON document holding the
//! server key pair and every peer. This module reads it strictly and
//! replaces it atomically.
//!
//! ## Document Layout
//! ```text
//! {
//!   "server":  { "private_key": b64, "public_key": b64 },
//!   "clients": [ { "id": u32, "name": str|null, "user": str,
//!                  "private_key": b64, "public_key": b64,
//!                  "preshared_key": b64 }, ... ]
//! }
//! ```
//!
//! ## Write Path
//! ```text
//! serialize → <name>.tmp (0600) → fsync → rename over <name>
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A document either loads completely or fails with `CorruptStore`;
//!   never hand the registry a partial peer list
//! - Only one process may own a store file
//!
//! ## Last Modified
//! v0.1.0 - Initial JSON store

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use wgdesk_core::{KeyPair, Peer};

use crate::error::{Result, ServerError};

// ============================================
// Documents
// ============================================

#[derive(Deserialize)]
struct RegistryDocument {
    server: KeyPair,
    clients: Vec<Peer>,
}

#[derive(Serialize)]
struct RegistryDocumentRef<'a> {
    server: &'a KeyPair,
    clients: &'a [Peer],
}

/// Validated contents of a registry document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRegistry {
    /// Server key pair.
    pub server: KeyPair,
    /// Peers in document order.
    pub peers: Vec<Peer>,
}

// ============================================
// RegistryStore
// ============================================

/// File-backed registry document.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    /// Creates a store for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    /// Reads the document, or `None` if it does not exist.
    ///
    /// # Errors
    /// Returns `CorruptStore` if the document is unreadable, does not
    /// match the expected layout, contains duplicate peer ids, or holds
    /// a server public key not derived from its private key.
    pub async fn load(&self) -> Result<Option<StoredRegistry>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(e.to_string())),
        };

        let document: RegistryDocument =
            serde_json::from_slice(&content).map_err(|e| self.corrupt(e.to_string()))?;

        if !document.server.is_consistent() {
            return Err(self.corrupt("server public key does not match private key"));
        }

        let mut seen = HashSet::with_capacity(document.clients.len());
        for peer in &document.clients {
            if !seen.insert(peer.id()) {
                return Err(self.corrupt(format!("duplicate peer id {}", peer.id())));
            }
        }

        debug!(
            "Loaded registry {} ({} peers)",
            self.path.display(),
            document.clients.len()
        );

        Ok(Some(StoredRegistry {
            server: document.server,
            peers: document.clients,
        }))
    }

    /// Reads the document, creating it with a fresh server key pair and
    /// no peers if it does not exist.
    ///
    /// # Errors
    /// Returns `CorruptStore` for a bad document and `StoreWrite` if the
    /// initial document cannot be written.
    pub async fn load_or_bootstrap(&self) -> Result<StoredRegistry> {
        if let Some(stored) = self.load().await? {
            return Ok(stored);
        }

        info!("No registry at {}, bootstrapping", self.path.display());
        let stored = StoredRegistry {
            server: KeyPair::generate(),
            peers: Vec::new(),
        };
        self.save(&stored.server, &stored.peers).await?;
        Ok(stored)
    }

    /// Atomically replaces the document.
    ///
    /// # Errors
    /// Returns `StoreWrite`; the previous document is left intact.
    pub async fn save(&self, server: &KeyPair, peers: &[Peer]) -> Result<()> {
        let document = RegistryDocumentRef {
            server,
            clients: peers,
        };
        let mut content = serde_json::to_vec_pretty(&document)
            .map_err(|e| ServerError::store_write(self.display(), e.to_string()))?;
        content.push(b'\n');

        write_atomic(&self.path, &content).await.map_err(|e| {
            error!("Failed to persist registry {}: {}", self.path.display(), e);
            ServerError::store_write(self.display(), e.to_string())
        })?;

        debug!("Persisted registry ({} peers)", peers.len());
        Ok(())
    }

    fn corrupt(&self, reason: impl Into<String>) -> ServerError {
        let err = ServerError::corrupt_store(self.display(), reason);
        error!("{}", err);
        err
    }
}

// ============================================
// Atomic Write
// ============================================

/// Writes `content` to a sibling temp file with mode 0600, syncs it and
/// renames it over `path`.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if result.is_err() {
        tokio::fs::remove_file(&tmp_path).await.ok();
    }
    result
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn store(dir: &TempDir) -> RegistryStore {
        RegistryStore::new(dir.path().join("data").join("wg.json"))
    }

    fn peer(last: u8, owner: &str) -> Peer {
        Peer::generate(Ipv4Addr::new(10, 0, 0, last).into(), owner, None)
    }

    #[tokio::test]
    async fn test_absent_store_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_persists_empty_registry() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);

        let first = s.load_or_bootstrap().await.unwrap();
        assert!(first.peers.is_empty());
        assert!(s.path().exists());

        let second = s.load_or_bootstrap().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let server = KeyPair::generate();
        let mut named = peer(7, "b@x.com");
        named.rename(Some("phone".into()));
        let peers = vec![peer(5, "a@x.com"), named, peer(3, "a@x.com")];

        s.save(&server, &peers).await.unwrap();
        let loaded = s.load().await.unwrap().unwrap();

        assert_eq!(loaded.server, server);
        assert_eq!(loaded.peers, peers);
    }

    #[tokio::test]
    async fn test_document_layout() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.save(&KeyPair::generate(), &[peer(5, "a@x.com")])
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(s.path()).unwrap()).unwrap();
        assert!(raw["server"]["private_key"].is_string());
        assert!(raw["server"]["public_key"].is_string());
        assert_eq!(raw["clients"][0]["id"], 0x0A00_0005);
        assert_eq!(raw["clients"][0]["user"], "a@x.com");
        assert!(raw["clients"][0]["name"].is_null());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_with_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        s.save(&KeyPair::generate(), &[]).await.unwrap();

        let mode = std::fs::metadata(s.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!s.path().with_file_name("wg.json.tmp").exists());
    }

    async fn load_raw(dir: &TempDir, value: &serde_json::Value) -> Result<Option<StoredRegistry>> {
        let s = store(dir);
        std::fs::create_dir_all(s.path().parent().unwrap()).unwrap();
        std::fs::write(s.path(), serde_json::to_vec(value).unwrap()).unwrap();
        s.load().await
    }

    fn valid_document() -> serde_json::Value {
        let server = KeyPair::generate();
        json!({
            "server": server,
            "clients": [peer(5, "a@x.com")],
        })
    }

    #[tokio::test]
    async fn test_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        std::fs::create_dir_all(s.path().parent().unwrap()).unwrap();
        std::fs::write(s.path(), b"{\"server\": ").unwrap();

        let err = s.load().await.unwrap_err();
        assert!(matches!(err, ServerError::CorruptStore { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_rejects_missing_fields_and_wrong_types() {
        let dir = TempDir::new().unwrap();

        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("clients");
        assert!(load_raw(&dir, &doc).await.is_err());

        let mut doc = valid_document();
        doc["clients"][0]["id"] = json!("10.0.0.5");
        assert!(load_raw(&dir, &doc).await.is_err());

        let mut doc = valid_document();
        doc["clients"][0].as_object_mut().unwrap().remove("user");
        assert!(load_raw(&dir, &doc).await.is_err());

        let mut doc = valid_document();
        doc["clients"][0]["public_key"] = json!("AAAA");
        assert!(load_raw(&dir, &doc).await.is_err());

        assert!(load_raw(&dir, &valid_document()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejects_duplicate_ids() {
        let dir = TempDir::new().unwrap();
        let mut doc = valid_document();
        doc["clients"] = json!([peer(5, "a@x.com"), peer(5, "b@x.com")]);

        let err = load_raw(&dir, &doc).await.unwrap_err();
        assert!(err.to_string().contains("duplicate peer id 10.0.0.5"));
    }

    #[tokio::test]
    async fn test_rejects_mismatched_server_keys() {
        let dir = TempDir::new().unwrap();
        let mut doc = valid_document();
        doc["server"]["public_key"] = json!(KeyPair::generate().public_key());

        let err = load_raw(&dir, &doc).await.unwrap_err();
        assert!(err.to_string().contains("server public key"));
    }
}
