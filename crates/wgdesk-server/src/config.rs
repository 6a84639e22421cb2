// ============================================
// File: crates/wgdesk-server/src/config.rs
// ============================================
//! # Settings
//!
//! ## Creation Reason
//! Everything about the deployment that is not peer data: the address
//! pool, what clients are told about the server, where the registry
//! lives and how the daemon gets reloaded.
//!
//! ## Main Functionality
//! - `Settings`: main structure, one field per TOML section
//! - TOML file loading and validation
//! - Conversion into the core `NetworkSettings`
//!
//! ## Configuration Sections
//! - `wireguard`: interface, pool, advertised ranges, endpoint, hooks
//! - `store`: registry document path
//! - `access`: email / domain allowlist
//! - `limits`: per-owner peer cap
//! - `reload`: daemon sync toggle and timeout
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [wireguard]
//! interface = "wg0"
//! addresses = "10.8.0.0/24"
//! allowed_ips = ["192.168.10.0/24"]
//! dns = "1.1.1.1"
//! endpoint_host = "vpn.example.com"
//! port = 51820
//! persistent_keepalive = 25
//!
//! [store]
//! path = "/var/lib/wgdesk/wg.json"
//!
//! [access]
//! allowed_domains = ["example.com"]
//!
//! [limits]
//! max_peers_per_owner = 5
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `[wireguard]` values are re-read on every registry load and are
//!   never written to the registry document
//! - Shrinking `addresses` does not drop existing peers; see registry
//!
//! ## Last Modified
//! v0.1.0 - Initial settings

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use wgdesk_common::Ipv4Pool;
use wgdesk_core::{HookScripts, NetworkSettings};

use crate::access::AccessPolicy;
use crate::error::{Result, ServerError};

/// Default settings file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wgdesk/wgdesk.toml";

/// Directory `wg-quick` looks in for `<interface>.conf`.
const WIREGUARD_CONFIG_DIR: &str = "/etc/wireguard";

/// Linux `IFNAMSIZ` minus the terminating NUL.
const MAX_INTERFACE_NAME_LEN: usize = 15;

// ============================================
// Settings
// ============================================

/// Main settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// WireGuard interface and network parameters.
    #[serde(default)]
    pub wireguard: WireguardConfig,

    /// Registry document location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Who may own peers.
    #[serde(default)]
    pub access: AccessConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Daemon reload behaviour.
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed and
    /// `ConfigInvalid` if a value fails validation.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading settings from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let settings: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    ///
    /// # Errors
    /// Same as [`Settings::load`] when the file exists.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("Settings file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parses settings from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigLoad` on a parse error and `ConfigInvalid` if a
    /// value fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates every section.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.wireguard.validate()?;
        self.reload.validate()?;
        Ok(())
    }

    /// Serializes settings to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Builds the network parameters handed to the registry.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the pool does not parse.
    pub fn network_settings(&self) -> Result<NetworkSettings> {
        let wg = &self.wireguard;
        Ok(NetworkSettings {
            pool: wg.pool()?,
            allowed_ips: wg.allowed_ips.clone(),
            dns: wg.dns.clone(),
            endpoint_host: wg.endpoint_host.clone(),
            port: wg.port,
            persistent_keepalive: wg.persistent_keepalive,
            hooks: wg.hooks(),
        })
    }

    /// Builds the allowlist.
    #[must_use]
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(
            self.access.allowed_emails.clone(),
            self.access.allowed_domains.clone(),
        )
    }
}

// ============================================
// WireguardConfig
// ============================================

/// WireGuard interface section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireguardConfig {
    /// Interface name passed to `wg` / `wg-quick`.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Peer address pool (CIDR notation).
    #[serde(default = "default_addresses")]
    pub addresses: String,

    /// Extra ranges routed through the tunnel on clients.
    #[serde(default)]
    pub allowed_ips: Vec<String>,

    /// DNS server pushed to clients.
    #[serde(default)]
    pub dns: Option<String>,

    /// Public hostname or IP clients connect to.
    #[serde(default = "default_endpoint_host")]
    pub endpoint_host: String,

    /// UDP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Keepalive interval in seconds (0 disables).
    #[serde(default)]
    pub persistent_keepalive: u16,

    /// Where the server interface config is written; defaults to
    /// `/etc/wireguard/<interface>.conf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    /// `PostUp` hook script.
    #[serde(default = "default_post_up")]
    pub post_up: PathBuf,

    /// `PreDown` hook script.
    #[serde(default = "default_pre_down")]
    pub pre_down: PathBuf,

    /// `PostDown` hook script.
    #[serde(default = "default_post_down")]
    pub post_down: PathBuf,
}

fn default_interface() -> String {
    "wg0".to_string()
}

fn default_addresses() -> String {
    "192.168.0.0/24".to_string()
}

fn default_endpoint_host() -> String {
    "vpn.example.com".to_string()
}

fn default_port() -> u16 {
    51820
}

fn default_post_up() -> PathBuf {
    HookScripts::default().post_up
}

fn default_pre_down() -> PathBuf {
    HookScripts::default().pre_down
}

fn default_post_down() -> PathBuf {
    HookScripts::default().post_down
}

impl WireguardConfig {
    fn validate(&self) -> Result<()> {
        if self.interface.is_empty() {
            return Err(ServerError::config_invalid(
                "wireguard.interface",
                "cannot be empty",
            ));
        }

        if self.interface.len() > MAX_INTERFACE_NAME_LEN {
            return Err(ServerError::config_invalid(
                "wireguard.interface",
                "cannot exceed 15 characters",
            ));
        }

        let pool = self.pool()?;
        if pool.candidate_count() == 0 {
            return Err(ServerError::config_invalid(
                "wireguard.addresses",
                "pool has no assignable peer addresses (prefix must be /30 or shorter)",
            ));
        }

        for range in &self.allowed_ips {
            if !is_cidr(range) {
                return Err(ServerError::config_invalid(
                    "wireguard.allowed_ips",
                    format!("'{range}' is not in CIDR notation"),
                ));
            }
        }

        if self.endpoint_host.trim().is_empty() {
            return Err(ServerError::config_invalid(
                "wireguard.endpoint_host",
                "cannot be empty",
            ));
        }

        if self.port == 0 {
            return Err(ServerError::config_invalid("wireguard.port", "cannot be 0"));
        }

        // wg-quick names the interface after the config file.
        let config_path = self.config_path();
        if interface_from_config_path(&config_path) != Some(self.interface.as_str()) {
            return Err(ServerError::config_invalid(
                "wireguard.config_path",
                format!(
                    "'{}' must be named {}.conf",
                    config_path.display(),
                    self.interface
                ),
            ));
        }

        Ok(())
    }

    /// Returns the server interface config path.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(|| {
            Path::new(WIREGUARD_CONFIG_DIR).join(format!("{}.conf", self.interface))
        })
    }

    /// Parses the address pool.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if `addresses` is not a valid network.
    pub fn pool(&self) -> Result<Ipv4Pool> {
        self.addresses
            .parse()
            .map_err(|e| ServerError::config_invalid("wireguard.addresses", format!("{e}")))
    }

    /// Returns the hook script paths.
    #[must_use]
    pub fn hooks(&self) -> HookScripts {
        HookScripts {
            post_up: self.post_up.clone(),
            pre_down: self.pre_down.clone(),
            post_down: self.post_down.clone(),
        }
    }
}

impl Default for WireguardConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            addresses: default_addresses(),
            allowed_ips: Vec::new(),
            dns: None,
            endpoint_host: default_endpoint_host(),
            port: default_port(),
            persistent_keepalive: 0,
            config_path: None,
            post_up: default_post_up(),
            pre_down: default_pre_down(),
            post_down: default_post_down(),
        }
    }
}

/// Returns the interface `wg-quick` brings up for `path`: the stem of an
/// `<interface>.conf` file.
#[must_use]
pub fn interface_from_config_path(path: &Path) -> Option<&str> {
    if path.extension()? != "conf" {
        return None;
    }
    path.file_stem()?.to_str().filter(|stem| !stem.is_empty())
}

/// Accepts `addr/prefix` for IPv4 or IPv6; host bits may be set.
fn is_cidr(s: &str) -> bool {
    let Some((addr, prefix)) = s.trim().split_once('/') else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => prefix <= 32,
        Ok(IpAddr::V6(_)) => prefix <= 128,
        Err(_) => false,
    }
}

// ============================================
// StoreConfig
// ============================================

/// Registry document section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON registry document.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/wg.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ============================================
// AccessConfig
// ============================================

/// Allowlist section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Individually allowed email addresses.
    #[serde(default)]
    pub allowed_emails: Vec<String>,

    /// Email domains whose every address is allowed.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum peers a single owner may hold (unset = unlimited).
    #[serde(default)]
    pub max_peers_per_owner: Option<usize>,
}

// ============================================
// ReloadConfig
// ============================================

/// Daemon reload section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Whether mutations sync the live interface.
    #[serde(default = "default_reload_enabled")]
    pub enabled: bool,

    /// Upper bound for one sync, in seconds.
    #[serde(default = "default_reload_timeout")]
    pub timeout_secs: u64,
}

fn default_reload_enabled() -> bool {
    true
}

fn default_reload_timeout() -> u64 {
    10
}

impl ReloadConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ServerError::config_invalid(
                "reload.timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Returns the timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: default_reload_enabled(),
            timeout_secs: default_reload_timeout(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
