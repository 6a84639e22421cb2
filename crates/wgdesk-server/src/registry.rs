// ============================================
// File: crates/wgdesk-server/src/registry.rs
// ============================================
//! # Peer Registry
//!
//! ## Creation Reason
//! The authoritative table of VPN peers. Every mutation goes through
//! here so that address uniqueness, the durable document and the live
//! interface never disagree for longer than one reload.
//!
//! ## Main Functionality
//! - `PeerRegistry::load`: read (or bootstrap) the store, merge in the
//!   current network settings
//! - Owner-scoped reads: `list_for_owner`, `count_for_owner`,
//!   `client_config`
//! - Mutations: `allocate_for_owner`, `add`, `remove_for_owner`,
//!   `rename_for_owner`
//! - Daemon control: `reload`, `start`, `stop`
//!
//! ## Mutation Sequence
//! ```text
//! write lock ─┬─ check (ownership / duplicate / limit)
//!             ├─ mutate in memory
//!             ├─ persist document ── fails → restore table, StoreWrite
//!             ├─ render server config
//!             └─ reload daemon ──── fails → ReloadFailed (kept, logged)
//! unlock
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Persist strictly before reload: after a crash the document may be
//!   ahead of the daemon, never behind; `reload()` reconciles
//! - The check-then-insert for addresses is atomic under the write lock
//! - Peers outside a narrowed pool are kept ("grandfathered") and
//!   still block their address
//!
//! ## Last Modified
//! v0.1.0 - Initial registry

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use wgdesk_common::{Ipv4Pool, PeerId};
use wgdesk_core::{
    allocator, render_client_config, render_server_config, Key, NetworkSettings, Peer,
    ServerConfiguration,
};

use crate::config::Settings;
use crate::error::{Result, ServerError};
use crate::reload::ReloadTrigger;
use crate::store::RegistryStore;

/// Upper bound on allocate-then-insert attempts for one peer.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// Picks a free address from a pool given the taken set.
pub type AddressAllocator =
    Arc<dyn Fn(&Ipv4Pool, &HashSet<PeerId>) -> wgdesk_core::Result<PeerId> + Send + Sync>;

// ============================================
// RegistryState
// ============================================

struct RegistryState {
    server: ServerConfiguration,
    /// Insertion order is render order.
    peers: Vec<Peer>,
}

impl RegistryState {
    fn position(&self, owner: &str, id: PeerId) -> Option<usize> {
        self.peers
            .iter()
            .position(|peer| peer.id() == id && peer.is_owned_by(owner))
    }

    fn contains(&self, id: PeerId) -> bool {
        self.peers.iter().any(|peer| peer.id() == id)
    }

    fn taken(&self) -> HashSet<PeerId> {
        self.peers.iter().map(Peer::id).collect()
    }

    fn count_for_owner(&self, owner: &str) -> usize {
        self.peers.iter().filter(|peer| peer.is_owned_by(owner)).count()
    }

    fn render(&self) -> String {
        render_server_config(&self.server, &self.peers)
    }
}

// ============================================
// PeerRegistry
// ============================================

/// Shared handle to the peer table.
///
/// # Thread Safety
/// All state sits behind one `RwLock`; mutations hold the write lock
/// through persist and reload, so they are linearizable.
pub struct PeerRegistry {
    state: RwLock<RegistryState>,
    store: RegistryStore,
    reloader: Arc<dyn ReloadTrigger>,
    allocator: AddressAllocator,
    max_peers_per_owner: Option<usize>,
}

impl PeerRegistry {
    /// Loads the registry from `store`, bootstrapping an empty one with
    /// a fresh server key pair if the document does not exist.
    ///
    /// # Errors
    /// Returns `CorruptStore` if the document is malformed and
    /// `StoreWrite` if bootstrapping cannot persist.
    pub async fn load(
        store: RegistryStore,
        network: NetworkSettings,
        reloader: Arc<dyn ReloadTrigger>,
    ) -> Result<Self> {
        let stored = store.load_or_bootstrap().await?;

        for peer in &stored.peers {
            if !network.pool.is_candidate(peer.id()) {
                warn!(
                    "Peer {} ({}) is outside pool {}, keeping it",
                    peer.id(),
                    peer.owner(),
                    network.pool
                );
            }
        }

        info!(
            "Registry loaded from {}: {} peers, pool {}",
            store.path().display(),
            stored.peers.len(),
            network.pool
        );

        Ok(Self {
            state: RwLock::new(RegistryState {
                server: ServerConfiguration {
                    keys: stored.server,
                    network,
                },
                peers: stored.peers,
            }),
            store,
            reloader,
            allocator: Arc::new(allocator::allocate),
            max_peers_per_owner: None,
        })
    }

    /// Loads the registry described by `settings`.
    ///
    /// # Errors
    /// Same as [`PeerRegistry::load`], plus `ConfigInvalid` for a bad pool.
    pub async fn open(settings: &Settings, reloader: Arc<dyn ReloadTrigger>) -> Result<Self> {
        let network = settings.network_settings()?;
        let store = RegistryStore::new(settings.store.path.clone());
        Ok(Self::load(store, network, reloader)
            .await?
            .with_peer_limit(settings.limits.max_peers_per_owner))
    }

    /// Caps how many peers one owner may allocate.
    #[must_use]
    pub fn with_peer_limit(mut self, limit: Option<usize>) -> Self {
        self.max_peers_per_owner = limit;
        self
    }

    /// Replaces the random address allocator.
    ///
    /// `allocate_for_owner` still checks every candidate under the write
    /// lock and retries on a collision, up to `MAX_ALLOCATION_ATTEMPTS`.
    #[must_use]
    pub fn with_allocator(mut self, allocator: AddressAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    // ========================================
    // Reads
    // ========================================

    /// Returns `owner`'s peers in insertion order.
    pub async fn list_for_owner(&self, owner: &str) -> Vec<Peer> {
        let state = self.state.read().await;
        state
            .peers
            .iter()
            .filter(|peer| peer.is_owned_by(owner))
            .cloned()
            .collect()
    }

    /// Returns how many peers `owner` has.
    pub async fn count_for_owner(&self, owner: &str) -> usize {
        self.state.read().await.count_for_owner(owner)
    }

    /// Returns the total number of peers.
    pub async fn len(&self) -> usize {
        self.state.read().await.peers.len()
    }

    /// Returns `true` if no peers are registered.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.peers.is_empty()
    }

    /// Returns the server public key.
    pub async fn server_public_key(&self) -> Key {
        self.state.read().await.server.keys.public_key().clone()
    }

    /// Renders the client config for `owner`'s peer `id`.
    ///
    /// # Errors
    /// Returns `NotFound` unless `owner` owns a peer with that id.
    pub async fn client_config(&self, owner: &str, id: PeerId) -> Result<String> {
        let state = self.state.read().await;
        let index = state
            .position(owner, id)
            .ok_or_else(|| ServerError::not_found(owner, id))?;
        Ok(render_client_config(&state.server, &state.peers[index]))
    }

    /// Renders the server config for the current table.
    pub async fn server_config(&self) -> String {
        self.state.read().await.render()
    }

    // ========================================
    // Mutations
    // ========================================

    /// Creates a peer for `owner` with fresh keys and a free address.
    ///
    /// # Errors
    /// - `PeerLimitReached` if `owner` is at the configured cap
    /// - `PoolExhausted` if no address is free
    /// - `StoreWrite` if the table cannot be persisted (nothing changes)
    /// - `ReloadFailed` if the daemon sync fails; the peer is kept and its
    ///   id is in [`ServerError::committed_peer`]
    pub async fn allocate_for_owner(&self, owner: &str, name: Option<String>) -> Result<Peer> {
        let mut state = self.state.write().await;

        if let Some(limit) = self.max_peers_per_owner {
            if state.count_for_owner(owner) >= limit {
                debug!("Owner {} is at the {}-peer limit", owner, limit);
                return Err(ServerError::PeerLimitReached {
                    owner: owner.to_string(),
                    limit,
                });
            }
        }

        let pool = state.server.network.pool;
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let id = (self.allocator)(&pool, &state.taken())?;
            let peer = Peer::generate(id, owner, name.clone());

            match self.insert_locked(&mut state, peer.clone()).await {
                Ok(()) => {
                    info!("Allocated peer {} for {}", id, owner);
                    return Ok(peer);
                }
                Err(ServerError::DuplicateAddress(id)) => {
                    debug!("Attempt {}: address {} collided, retrying", attempt, id);
                }
                Err(e) if e.is_committed() => {
                    info!("Allocated peer {} for {}", id, owner);
                    return Err(e.with_peer(id));
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            "Gave up allocating for {} after {} attempts",
            owner, MAX_ALLOCATION_ATTEMPTS
        );
        Err(ServerError::PoolExhausted {
            pool: pool.to_string(),
            capacity: pool.candidate_count(),
        })
    }

    /// Inserts a fully formed peer.
    ///
    /// # Errors
    /// - `DuplicateAddress` if `peer.id()` is already registered
    /// - `StoreWrite` if the table cannot be persisted (nothing changes)
    /// - `ReloadFailed` if the daemon sync fails (the peer is kept)
    pub async fn add(&self, peer: Peer) -> Result<()> {
        let mut state = self.state.write().await;
        self.insert_locked(&mut state, peer).await
    }

    /// Removes `owner`'s peer `id` and returns it.
    ///
    /// # Errors
    /// - `NotFound` unless `owner` owns a peer with that id
    /// - `StoreWrite` if the table cannot be persisted (nothing changes)
    /// - `ReloadFailed` if the daemon sync fails (the removal is kept)
    pub async fn remove_for_owner(&self, owner: &str, id: PeerId) -> Result<Peer> {
        let mut state = self.state.write().await;
        let index = state
            .position(owner, id)
            .ok_or_else(|| ServerError::not_found(owner, id))?;

        let previous = state.peers.clone();
        let removed = state.peers.remove(index);
        self.commit_locked(&mut state, previous).await?;

        info!("Removed peer {} of {}", id, owner);
        Ok(removed)
    }

    /// Sets the display name of `owner`'s peer `id`.
    ///
    /// # Errors
    /// - `NotFound` unless `owner` owns a peer with that id
    /// - `StoreWrite` if the table cannot be persisted (nothing changes)
    /// - `ReloadFailed` if the daemon sync fails (the rename is kept)
    pub async fn rename_for_owner(
        &self,
        owner: &str,
        id: PeerId,
        name: Option<String>,
    ) -> Result<Peer> {
        let mut state = self.state.write().await;
        let index = state
            .position(owner, id)
            .ok_or_else(|| ServerError::not_found(owner, id))?;

        let previous = state.peers.clone();
        state.peers[index].rename(name);
        let renamed = state.peers[index].clone();
        self.commit_locked(&mut state, previous).await?;

        debug!("Renamed peer {} of {}", id, owner);
        Ok(renamed)
    }

    // ========================================
    // Daemon Control
    // ========================================

    /// Re-applies the current table to the daemon.
    ///
    /// # Errors
    /// Returns `ReloadFailed` if the sync fails.
    pub async fn reload(&self) -> Result<()> {
        let state = self.state.read().await;
        self.reloader
            .apply(&state.render())
            .await
            .map_err(|e| log_reload_failure(&e))
    }

    /// Brings the interface up with the current table.
    ///
    /// # Errors
    /// Returns `ReloadFailed` if the interface cannot be started.
    pub async fn start(&self) -> Result<()> {
        let state = self.state.read().await;
        self.reloader
            .up(&state.render())
            .await
            .map_err(|e| log_reload_failure(&e))
    }

    /// Brings the interface down.
    ///
    /// # Errors
    /// Returns `ReloadFailed` if the interface cannot be stopped.
    pub async fn stop(&self) -> Result<()> {
        let _state = self.state.read().await;
        self.reloader.down().await.map_err(|e| log_reload_failure(&e))
    }

    // ========================================
    // Internal
    // ========================================

    async fn insert_locked(&self, state: &mut RegistryState, peer: Peer) -> Result<()> {
        if state.contains(peer.id()) {
            return Err(ServerError::DuplicateAddress(peer.id()));
        }

        let previous = state.peers.clone();
        state.peers.push(peer);
        self.commit_locked(state, previous).await
    }

    /// Persists the table, rolling back to `previous` on failure, then
    /// pushes the rendered config to the daemon.
    async fn commit_locked(&self, state: &mut RegistryState, previous: Vec<Peer>) -> Result<()> {
        if let Err(e) = self.store.save(&state.server.keys, &state.peers).await {
            state.peers = previous;
            return Err(e);
        }

        self.reloader
            .apply(&state.render())
            .await
            .map_err(|e| log_reload_failure(&e))
    }
}

fn log_reload_failure(err: &ServerError) -> ServerError {
    let err = match err {
        ServerError::ReloadFailed { reason, .. } => ServerError::reload_failed(reason.clone()),
        other => ServerError::reload_failed(other.to_string()),
    };
    warn!("{}; registry state is saved", err);
    err
}

impl std::fmt::Debug for PeerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRegistry")
            .field("store", &self.store)
            .field("max_peers_per_owner", &self.max_peers_per_owner)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;
    use wgdesk_core::HookScripts;

    use super::*;
    use crate::reload::MemoryReloader;

    fn network(pool: &str) -> NetworkSettings {
        NetworkSettings {
            pool: pool.parse().unwrap(),
            allowed_ips: Vec::new(),
            dns: None,
            endpoint_host: "vpn.example.com".into(),
            port: 51820,
            persistent_keepalive: 0,
            hooks: HookScripts::default(),
        }
    }

    async fn registry(dir: &TempDir, pool: &str) -> (PeerRegistry, Arc<MemoryReloader>) {
        let reloader = Arc::new(MemoryReloader::new());
        let registry = PeerRegistry::load(
            RegistryStore::new(dir.path().join("wg.json")),
            network(pool),
            reloader.clone(),
        )
        .await
        .unwrap();
        (registry, reloader)
    }

    fn id(d: u8) -> PeerId {
        Ipv4Addr::new(10, 0, 0, d).into()
    }

    #[tokio::test]
    async fn test_allocate_persists_then_reloads() {
        let dir = TempDir::new().unwrap();
        let (registry, reloader) = registry(&dir, "10.0.0.0/24").await;

        let peer = registry.allocate_for_owner("a@x.com", None).await.unwrap();

        let applied = reloader.last_applied().unwrap();
        assert!(applied.contains(&format!("AllowedIPs = {}/32", peer.id())));

        let stored = RegistryStore::new(dir.path().join("wg.json"))
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.peers, vec![peer]);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate() {
        let dir = TempDir::new().unwrap();
        let (registry, reloader) = registry(&dir, "10.0.0.0/24").await;

        registry
            .add(Peer::generate(id(5), "a@x.com", None))
            .await
            .unwrap();
        let err = registry
            .add(Peer::generate(id(5), "b@x.com", None))
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::DuplicateAddress(d) if d == id(5)));
        assert_eq!(registry.len().await, 1);
        assert_eq!(reloader.applied_count(), 1);
    }

    #[tokio::test]
    async fn test_peer_limit() {
        let dir = TempDir::new().unwrap();
        let (registry, _) = registry(&dir, "10.0.0.0/24").await;
        let registry = registry.with_peer_limit(Some(2));

        registry.allocate_for_owner("a@x.com", None).await.unwrap();
        registry.allocate_for_owner("a@x.com", None).await.unwrap();
        let err = registry.allocate_for_owner("a@x.com", None).await.unwrap_err();
        assert!(matches!(err, ServerError::PeerLimitReached { limit: 2, .. }));
        assert!(err.is_client_error());

        registry.allocate_for_owner("b@x.com", None).await.unwrap();
        assert_eq!(registry.count_for_owner("a@x.com").await, 2);
        assert_eq!(registry.count_for_owner("b@x.com").await, 1);
    }

    #[tokio::test]
    async fn test_pool_exhaustion() {
        let dir = TempDir::new().unwrap();
        let (registry, _) = registry(&dir, "10.0.0.0/30").await;

        let only = registry.allocate_for_owner("a@x.com", None).await.unwrap();
        assert_eq!(only.id(), id(2));

        let err = registry.allocate_for_owner("a@x.com", None).await.unwrap_err();
        assert!(matches!(err, ServerError::PoolExhausted { capacity: 1, .. }));
        assert_eq!(registry.len().await, 1);
    }

    /// Hands out `ids` in order, then repeats the last one.
    fn scripted_allocator(ids: Vec<PeerId>, calls: Arc<AtomicUsize>) -> AddressAllocator {
        Arc::new(move |_pool: &Ipv4Pool, _taken: &HashSet<PeerId>| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(ids[n.min(ids.len() - 1)])
        })
    }

    #[tokio::test]
    async fn test_allocation_retries_on_collision() {
        let dir = TempDir::new().unwrap();
        let (registry, _) = registry(&dir, "10.0.0.0/24").await;
        registry
            .add(Peer::generate(id(5), "b@x.com", None))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let registry =
            registry.with_allocator(scripted_allocator(vec![id(5), id(6)], calls.clone()));

        let peer = registry.allocate_for_owner("a@x.com", None).await.unwrap();
        assert_eq!(peer.id(), id(6));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.list_for_owner("b@x.com").await[0].id(), id(5));
    }

    #[tokio::test]
    async fn test_allocation_gives_up_after_repeated_collisions() {
        let dir = TempDir::new().unwrap();
        let (registry, reloader) = registry(&dir, "10.0.0.0/24").await;
        registry
            .add(Peer::generate(id(5), "b@x.com", None))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry.with_allocator(scripted_allocator(vec![id(5)], calls.clone()));

        let err = registry.allocate_for_owner("a@x.com", None).await.unwrap_err();
        assert!(matches!(err, ServerError::PoolExhausted { capacity: 253, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ALLOCATION_ATTEMPTS);
        assert_eq!(registry.len().await, 1);
        assert_eq!(reloader.applied_count(), 1);
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_mutation() {
        let dir = TempDir::new().unwrap();
        let (registry, reloader) = registry(&dir, "10.0.0.0/24").await;
        reloader.set_failing(true);

        let err = registry.allocate_for_owner("a@x.com", None).await.unwrap_err();
        assert!(err.is_committed());
        assert_eq!(registry.count_for_owner("a@x.com").await, 1);

        let kept = registry.list_for_owner("a@x.com").await;
        assert_eq!(err.committed_peer(), Some(kept[0].id()));

        let stored = RegistryStore::new(dir.path().join("wg.json"))
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.peers.len(), 1);

        reloader.set_failing(false);
        registry.reload().await.unwrap();
        assert_eq!(reloader.applied_count(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back() {
        let dir = TempDir::new().unwrap();
        let (registry, reloader) = registry(&dir, "10.0.0.0/24").await;
        registry
            .add(Peer::generate(id(9), "a@x.com", None))
            .await
            .unwrap();

        // A directory where the temp file would go makes the write fail.
        std::fs::create_dir(dir.path().join("wg.json.tmp")).unwrap();

        let err = registry.remove_for_owner("a@x.com", id(9)).await.unwrap_err();
        assert!(matches!(err, ServerError::StoreWrite { .. }));
        assert_eq!(registry.count_for_owner("a@x.com").await, 1);

        let err = registry
            .rename_for_owner("a@x.com", id(9), Some("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::StoreWrite { .. }));
        assert_eq!(registry.list_for_owner("a@x.com").await[0].name(), None);
        assert_eq!(reloader.applied_count(), 1);
    }

    #[tokio::test]
    async fn test_rename_and_remove_check_ownership() {
        let dir = TempDir::new().unwrap();
        let (registry, _) = registry(&dir, "10.0.0.0/24").await;
        registry
            .add(Peer::generate(id(5), "a@x.com", None))
            .await
            .unwrap();

        let err = registry
            .rename_for_owner("b@x.com", id(5), Some("mine".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound { .. }));
        assert!(registry.client_config("b@x.com", id(5)).await.is_err());
        assert!(registry.remove_for_owner("b@x.com", id(5)).await.is_err());
        assert_eq!(registry.len().await, 1);

        let renamed = registry
            .rename_for_owner("a@x.com", id(5), Some("laptop".into()))
            .await
            .unwrap();
        assert_eq!(renamed.name(), Some("laptop"));

        let removed = registry.remove_for_owner("a@x.com", id(5)).await.unwrap();
        assert_eq!(removed.id(), id(5));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = TempDir::new().unwrap();
        let (registry, reloader) = registry(&dir, "10.0.0.0/24").await;

        registry.start().await.unwrap();
        assert!(reloader.is_up());
        assert!(reloader.last_applied().unwrap().starts_with("[Interface]\n"));

        registry.stop().await.unwrap();
        assert!(!reloader.is_up());
    }

    #[tokio::test]
    async fn test_grandfathers_out_of_pool_peers() {
        let dir = TempDir::new().unwrap();
        let outside = PeerId::from(Ipv4Addr::new(10, 0, 1, 7));
        {
            let (wide, _) = registry(&dir, "10.0.0.0/16").await;
            wide.add(Peer::generate(outside, "a@x.com", None))
                .await
                .unwrap();
        }

        let (narrow, _) = registry(&dir, "10.0.0.0/24").await;
        assert_eq!(narrow.list_for_owner("a@x.com").await[0].id(), outside);
        assert!(narrow
            .server_config()
            .await
            .contains("AllowedIPs = 10.0.1.7/32"));
        assert!(narrow.client_config("a@x.com", outside).await.is_ok());
        narrow.remove_for_owner("a@x.com", outside).await.unwrap();
    }
}
