// ============================================
// File: crates/wgdesk-server/src/main.rs
// ============================================
//! # wgdesk Entry Point
//!
//! ## Creation Reason
//! Operator front end for the peer registry: manage peers on behalf of
//! an owner, print configs, and drive the interface.
//!
//! ## Usage
//! ```bash
//! wgdesk init                                   # create registry, print server key
//! wgdesk add --owner a@example.com --name laptop
//! wgdesk list --owner a@example.com
//! wgdesk client-config --owner a@example.com --id 192.168.0.17 > laptop.conf
//! wgdesk rename --owner a@example.com --id 192.168.0.17 --name work
//! wgdesk remove --owner a@example.com --id 192.168.0.17
//! wgdesk up | sync | down
//! wgdesk check-access --email a@example.com
//! wgdesk validate
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `up`, `down` and every mutation with reload enabled need root
//! - A `ReloadFailed` exit still means the change was saved
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wgdesk_common::PeerId;
use wgdesk_server::config::DEFAULT_CONFIG_PATH;
use wgdesk_server::{
    DisabledReloader, PeerRegistry, ReloadTrigger, ServerError, Settings, WgQuickReloader,
};

// ============================================
// CLI Definition
// ============================================

/// WireGuard peer registry and config generator
#[derive(Parser, Debug)]
#[command(name = "wgdesk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to settings file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the registry document if missing and show the server key
    Init,

    /// List an owner's peers
    List {
        /// Owner identity (email)
        #[arg(short, long)]
        owner: String,
    },

    /// Allocate a new peer for an owner
    Add {
        /// Owner identity (email)
        #[arg(short, long)]
        owner: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Skip the allowlist check
        #[arg(long)]
        force: bool,
    },

    /// Remove one of an owner's peers
    Remove {
        /// Owner identity (email)
        #[arg(short, long)]
        owner: String,

        /// Peer address (dotted or integer form)
        #[arg(short, long)]
        id: PeerId,
    },

    /// Change or clear a peer's display name
    Rename {
        /// Owner identity (email)
        #[arg(short, long)]
        owner: String,

        /// Peer address (dotted or integer form)
        #[arg(short, long)]
        id: PeerId,

        /// New name; omit to clear
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print a peer's client config
    ClientConfig {
        /// Owner identity (email)
        #[arg(short, long)]
        owner: String,

        /// Peer address (dotted or integer form)
        #[arg(short, long)]
        id: PeerId,
    },

    /// Print the server interface config
    ServerConfig,

    /// Re-apply the registry to the running interface
    Sync,

    /// Write the server config and bring the interface up
    Up,

    /// Bring the interface down
    Down,

    /// Check an email against the allowlist
    CheckAccess {
        /// Email to check
        #[arg(short, long)]
        email: String,
    },

    /// Validate the settings file
    Validate,
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        // No-op if the configured subscriber is already installed
        init_logging("info");
        match e.downcast_ref::<ServerError>() {
            Some(err) if err.is_committed() => {
                warn!("{}", err);
                eprintln!("The change was saved but the interface was not updated.");
                if let Some(id) = err.committed_peer() {
                    println!("{id}");
                }
                eprintln!("Run 'wgdesk sync' once the problem is fixed.");
            }
            _ => error!("{}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Validate = cli.command {
        init_logging("info");
        return cmd_validate(cli.config).await;
    }

    let settings = Settings::load_or_default(&cli.config).await?;
    init_logging(&settings.logging.level);

    match cli.command {
        Commands::Init => cmd_init(&settings).await,
        Commands::List { owner } => cmd_list(&settings, &owner).await,
        Commands::Add { owner, name, force } => cmd_add(&settings, &owner, name, force).await,
        Commands::Remove { owner, id } => cmd_remove(&settings, &owner, id).await,
        Commands::Rename { owner, id, name } => cmd_rename(&settings, &owner, id, name).await,
        Commands::ClientConfig { owner, id } => cmd_client_config(&settings, &owner, id).await,
        Commands::ServerConfig => cmd_server_config(&settings).await,
        Commands::Sync => cmd_sync(&settings).await,
        Commands::Up => cmd_up(&settings).await,
        Commands::Down => cmd_down(&settings).await,
        Commands::CheckAccess { email } => cmd_check_access(&settings, &email),
        Commands::Validate => Ok(()),
    }
}

// ============================================
// Commands
// ============================================

/// Creates the registry if needed.
async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;

    println!("Registry:    {}", settings.store.path.display());
    println!("Peers:       {}", registry.len().await);
    println!("Server key:  {}", registry.server_public_key().await);
    Ok(())
}

/// Lists an owner's peers.
async fn cmd_list(settings: &Settings, owner: &str) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    let peers = registry.list_for_owner(owner).await;

    if peers.is_empty() {
        println!("No peers for {owner}");
        return Ok(());
    }

    println!("{:<18} {:<24} PUBLIC KEY", "ADDRESS", "NAME");
    for peer in peers {
        println!(
            "{:<18} {:<24} {}",
            peer.id().to_string(),
            peer.name().unwrap_or("-"),
            peer.public_key()
        );
    }
    Ok(())
}

/// Allocates a peer.
async fn cmd_add(
    settings: &Settings,
    owner: &str,
    name: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    if !force && !settings.access_policy().is_allowed(owner) {
        anyhow::bail!("'{owner}' is not on the allowlist (use --force to override)");
    }

    let registry = open_registry(settings).await?;
    let peer = registry.allocate_for_owner(owner, name).await?;

    info!("Added {} for {}", peer.id(), owner);
    println!("{}", peer.id());
    Ok(())
}

/// Removes a peer.
async fn cmd_remove(settings: &Settings, owner: &str, id: PeerId) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    registry.remove_for_owner(owner, id).await?;

    println!("Removed {id}");
    Ok(())
}

/// Renames a peer.
async fn cmd_rename(
    settings: &Settings,
    owner: &str,
    id: PeerId,
    name: Option<String>,
) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    let peer = registry.rename_for_owner(owner, id, name).await?;

    println!("{} is now '{}'", peer.id(), peer.name().unwrap_or(""));
    Ok(())
}

/// Prints a client config.
async fn cmd_client_config(settings: &Settings, owner: &str, id: PeerId) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    print!("{}", registry.client_config(owner, id).await?);
    Ok(())
}

/// Prints the server config.
async fn cmd_server_config(settings: &Settings) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    print!("{}", registry.server_config().await);
    Ok(())
}

/// Re-applies the registry to the interface.
async fn cmd_sync(settings: &Settings) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    registry.reload().await?;

    println!("Synced {} peers", registry.len().await);
    Ok(())
}

/// Brings the interface up.
async fn cmd_up(settings: &Settings) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    registry.start().await?;

    println!("{} is up", settings.wireguard.interface);
    Ok(())
}

/// Brings the interface down.
async fn cmd_down(settings: &Settings) -> anyhow::Result<()> {
    let registry = open_registry(settings).await?;
    registry.stop().await?;

    println!("{} is down", settings.wireguard.interface);
    Ok(())
}

/// Checks an email against the allowlist.
fn cmd_check_access(settings: &Settings, email: &str) -> anyhow::Result<()> {
    let policy = settings.access_policy();
    if policy.is_empty() {
        warn!("Allowlist is empty; every identity is denied");
    }

    if policy.is_allowed(email) {
        println!("allowed: {email}");
        Ok(())
    } else {
        anyhow::bail!("denied: {email}")
    }
}

/// Validates the settings file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Settings file not found: {}", config_path.display());
        println!("   Defaults will be used.");
        return Ok(());
    }

    let settings = Settings::load(&config_path).await?;
    let wg = &settings.wireguard;

    println!("✅ Settings are valid");
    println!();
    println!("WireGuard:");
    println!("   Interface:  {}", wg.interface);
    println!("   Pool:       {}", wg.addresses);
    println!("   Endpoint:   {}:{}", wg.endpoint_host, wg.port);
    println!("   Config:     {}", wg.config_path().display());
    if let Some(dns) = &wg.dns {
        println!("   DNS:        {dns}");
    }
    println!();
    println!("Store:         {}", settings.store.path.display());
    println!(
        "Reload:        {}",
        if settings.reload.enabled {
            format!("enabled ({}s timeout)", settings.reload.timeout_secs)
        } else {
            "disabled".to_string()
        }
    );
    if let Some(limit) = settings.limits.max_peers_per_owner {
        println!("Peer limit:    {limit} per owner");
    }
    println!();

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

/// Picks the reloader configured in `[reload]`.
fn reloader(settings: &Settings) -> anyhow::Result<Arc<dyn ReloadTrigger>> {
    if settings.reload.enabled {
        Ok(Arc::new(WgQuickReloader::from_settings(settings)?))
    } else {
        Ok(Arc::new(DisabledReloader))
    }
}

/// Loads the registry described by `settings`.
async fn open_registry(settings: &Settings) -> anyhow::Result<PeerRegistry> {
    Ok(PeerRegistry::open(settings, reloader(settings)?).await?)
}
