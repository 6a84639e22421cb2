// ============================================
// File: crates/wgdesk-server/src/reload/wg_quick.rs
// ============================================
//! # wg-quick Reloader
//!
//! ## Creation Reason
//! Applies rendered configs to a real kernel interface using the stock
//! WireGuard tools.
//!
//! ## Command Sequence
//! ```text
//! apply: write <dir>/<iface>.conf (atomic, 0600)
//!        wg-quick strip <dir>/<iface>.conf  → stdout = wg(8)-only config
//!        wg syncconf <iface> /dev/stdin     ← stdin
//!
//! up:    write <dir>/<iface>.conf, create missing hook scripts
//!        wg-quick up <dir>/<iface>.conf
//!
//! down:  wg-quick down <dir>/<iface>.conf
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `wg-quick` is always handed the config file path, never a bare
//!   interface name, and names the interface after the file stem; the
//!   reloader derives its interface the same way
//! - Requires root (or CAP_NET_ADMIN) and `wg`, `wg-quick` on PATH
//! - Each whole sequence runs under one timeout; children are killed
//!   when it fires
//!
//! ## Last Modified
//! v0.1.0 - Initial wg-quick adapter
//! v0.1.1 - Pass the config path to wg-quick; interface from file stem

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use wgdesk_core::HookScripts;

use super::ReloadTrigger;
use crate::config::{interface_from_config_path, Settings};
use crate::error::{Result, ServerError};
use crate::store::write_atomic;

/// Reloader driving `wg` / `wg-quick`.
#[derive(Debug, Clone)]
pub struct WgQuickReloader {
    /// Interface name, the stem of `config_path`
    interface: String,
    config_path: PathBuf,
    hooks: HookScripts,
    timeout: Duration,
    wg_quick: PathBuf,
    wg: PathBuf,
}

impl WgQuickReloader {
    /// Creates a reloader for the interface configured by `config_path`.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` unless `config_path` names a
    /// `<interface>.conf` file.
    pub fn new(
        config_path: impl Into<PathBuf>,
        hooks: HookScripts,
        timeout: Duration,
    ) -> Result<Self> {
        let config_path = config_path.into();
        let interface = interface_from_config_path(&config_path)
            .ok_or_else(|| {
                ServerError::config_invalid(
                    "wireguard.config_path",
                    format!(
                        "'{}' must be an <interface>.conf file",
                        config_path.display()
                    ),
                )
            })?
            .to_string();

        Ok(Self {
            interface,
            config_path,
            hooks,
            timeout,
            wg_quick: PathBuf::from("wg-quick"),
            wg: PathBuf::from("wg"),
        })
    }

    /// Creates a reloader from the `[wireguard]` and `[reload]` sections.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the config path does not name the
    /// configured interface.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let reloader = Self::new(
            settings.wireguard.config_path(),
            settings.wireguard.hooks(),
            settings.reload.timeout(),
        )?;

        if reloader.interface != settings.wireguard.interface {
            return Err(ServerError::config_invalid(
                "wireguard.config_path",
                format!(
                    "'{}' configures '{}', not '{}'",
                    reloader.config_path.display(),
                    reloader.interface,
                    settings.wireguard.interface
                ),
            ));
        }
        Ok(reloader)
    }

    /// Uses the given `wg-quick` and `wg` executables instead of the
    /// ones on PATH.
    #[must_use]
    pub fn with_tools(mut self, wg_quick: impl Into<PathBuf>, wg: impl Into<PathBuf>) -> Self {
        self.wg_quick = wg_quick.into();
        self.wg = wg.into();
        self
    }

    /// Returns the interface name.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Returns the config file handed to `wg-quick`.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    async fn write_config(&self, server_config: &str) -> Result<()> {
        write_atomic(&self.config_path, server_config.as_bytes())
            .await
            .map_err(|e| {
                ServerError::reload_failed(format!(
                    "failed to write {}: {e}",
                    self.config_path.display()
                ))
            })
    }

    async fn ensure_hooks(&self) -> Result<()> {
        for path in self.hooks.paths() {
            ensure_script(path).await.map_err(|e| {
                ServerError::reload_failed(format!(
                    "failed to create hook script {}: {e}",
                    path.display()
                ))
            })?;
        }
        Ok(())
    }

    async fn wg_quick(&self, action: &str) -> Result<Vec<u8>> {
        run(
            &self.wg_quick,
            &[OsStr::new(action), self.config_path.as_os_str()],
            None,
        )
        .await
    }

    async fn sync(&self) -> Result<()> {
        let stripped = self.wg_quick("strip").await?;
        run(
            &self.wg,
            &["syncconf", self.interface.as_str(), "/dev/stdin"],
            Some(&stripped),
        )
        .await?;
        Ok(())
    }

    async fn with_timeout<F>(&self, what: &str, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>> + Send,
    {
        if let Ok(result) = tokio::time::timeout(self.timeout, fut).await {
            result
        } else {
            warn!("{} on {} timed out after {:?}", what, self.interface, self.timeout);
            Err(ServerError::reload_failed(format!(
                "{what} timed out after {}s",
                self.timeout.as_secs()
            )))
        }
    }
}

#[async_trait]
impl ReloadTrigger for WgQuickReloader {
    async fn apply(&self, server_config: &str) -> Result<()> {
        self.with_timeout("sync", async {
            self.write_config(server_config).await?;
            self.sync().await
        })
        .await?;

        debug!("Synced {}", self.interface);
        Ok(())
    }

    async fn up(&self, server_config: &str) -> Result<()> {
        self.with_timeout("up", async {
            self.write_config(server_config).await?;
            self.ensure_hooks().await?;
            self.wg_quick("up").await?;
            Ok(())
        })
        .await?;

        info!("Interface {} is up", self.interface);
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        self.with_timeout("down", async {
            self.wg_quick("down").await?;
            Ok(())
        })
        .await?;

        info!("Interface {} is down", self.interface);
        Ok(())
    }
}

// ============================================
// Helpers
// ============================================

/// Runs `program args`, optionally feeding `stdin`, and returns stdout.
async fn run<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    stdin: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let program_name = program.display().to_string();
    let command_line = std::iter::once(program.as_os_str())
        .chain(args.iter().map(AsRef::as_ref))
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ");
    debug!("Running: {}", command_line);

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ServerError::reload_failed(format!("failed to spawn {program_name}: {e}")))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input).await.map_err(|e| {
            ServerError::reload_failed(format!("failed to write to {program_name}: {e}"))
        })?;
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ServerError::reload_failed(format!("{command_line}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ServerError::reload_failed(format!(
            "{command_line} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Creates an empty executable script at `path` unless one exists.
async fn ensure_script(path: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, b"#!/bin/sh\n").await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    info!("Created empty hook script {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn hooks(dir: &TempDir) -> HookScripts {
        HookScripts {
            post_up: dir.path().join("hooks/postup.sh"),
            pre_down: dir.path().join("hooks/predown.sh"),
            post_down: dir.path().join("hooks/postdown.sh"),
        }
    }

    fn reloader(dir: &TempDir, timeout: Duration) -> WgQuickReloader {
        WgQuickReloader::new(dir.path().join("wg0.conf"), hooks(dir), timeout).unwrap()
    }

    /// Installs shell stand-ins for `wg-quick` and `wg` that log what
    /// they were asked to do under `dir/log`.
    #[cfg(unix)]
    fn fake_tools(dir: &TempDir) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.path().join("log");
        std::fs::create_dir_all(&log).unwrap();
        let log = log.display();

        let wg_quick = dir.path().join("wg-quick");
        std::fs::write(
            &wg_quick,
            format!(
                "#!/bin/sh\n\
                 echo \"$1 $2\" >> {log}/wg-quick\n\
                 [ \"$1\" = strip ] && cat \"$2\"\n\
                 exit 0\n"
            ),
        )
        .unwrap();

        let wg = dir.path().join("wg");
        std::fs::write(
            &wg,
            format!(
                "#!/bin/sh\n\
                 echo \"$1 $2\" > {log}/wg\n\
                 cat \"$3\" > {log}/synced\n"
            ),
        )
        .unwrap();

        for tool in [&wg_quick, &wg] {
            std::fs::set_permissions(tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        (wg_quick, wg)
    }

    #[test]
    fn test_interface_comes_from_config_file() {
        let dir = TempDir::new().unwrap();
        let r = WgQuickReloader::new(dir.path().join("wg1.conf"), hooks(&dir), Duration::from_secs(1))
            .unwrap();
        assert_eq!(r.interface(), "wg1");

        for bad in ["wg1", "wg1.toml", ".conf"] {
            let err = WgQuickReloader::new(dir.path().join(bad), hooks(&dir), Duration::from_secs(1))
                .unwrap_err();
            assert!(err.is_config_error(), "{bad}: {err}");
        }
    }

    #[test]
    fn test_from_settings_rejects_mismatched_interface() {
        let mut settings = Settings::default();
        settings.wireguard.interface = "wg1".into();
        settings.wireguard.config_path = Some(PathBuf::from("/etc/wireguard/wg0.conf"));
        assert!(WgQuickReloader::from_settings(&settings).is_err());

        settings.wireguard.config_path = None;
        let r = WgQuickReloader::from_settings(&settings).unwrap();
        assert_eq!(r.interface(), "wg1");
        assert_eq!(r.config_path(), Path::new("/etc/wireguard/wg1.conf"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_apply_syncs_the_file_it_wrote() {
        let dir = TempDir::new().unwrap();
        let (wg_quick, wg) = fake_tools(&dir);
        let config_path = dir.path().join("wg1.conf");
        let r = WgQuickReloader::new(&config_path, hooks(&dir), Duration::from_secs(5))
            .unwrap()
            .with_tools(wg_quick, wg);

        // A stale file for another interface must not be what gets synced.
        std::fs::write(dir.path().join("wg0.conf"), "[Interface]\nSTALE\n").unwrap();

        let text = "[Interface]\nListenPort = 51820\n\n[Peer]\nAllowedIPs = 10.0.0.5/32\n";
        r.apply(text).await.unwrap();

        let log = dir.path().join("log");
        assert_eq!(std::fs::read_to_string(log.join("synced")).unwrap(), text);
        assert_eq!(std::fs::read_to_string(log.join("wg")).unwrap().trim(), "syncconf wg1");
        assert_eq!(
            std::fs::read_to_string(log.join("wg-quick")).unwrap().trim(),
            format!("strip {}", config_path.display())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_up_and_down_use_config_file() {
        let dir = TempDir::new().unwrap();
        let (wg_quick, wg) = fake_tools(&dir);
        let config_path = dir.path().join("wg1.conf");
        let r = WgQuickReloader::new(&config_path, hooks(&dir), Duration::from_secs(5))
            .unwrap()
            .with_tools(wg_quick, wg);

        r.up("[Interface]\n").await.unwrap();
        r.down().await.unwrap();

        let calls = std::fs::read_to_string(dir.path().join("log/wg-quick")).unwrap();
        let path = config_path.display();
        assert_eq!(calls, format!("up {path}\ndown {path}\n"));
        assert!(dir.path().join("hooks/postup.sh").exists());
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run(Path::new("sh"), &["-c", "printf hello"], None).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_run_feeds_stdin() {
        let out = run(Path::new("cat"), &["-"], Some(b"[Interface]\n")).await.unwrap();
        assert_eq!(out, b"[Interface]\n");
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let err = run(Path::new("sh"), &["-c", "echo boom >&2; exit 3"], None)
            .await
            .unwrap_err();
        assert!(err.is_committed());
        assert!(err.to_string().contains("boom"));

        let err = run(Path::new("wgdesk-no-such-binary"), &["x"], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_reload_failed() {
        let dir = TempDir::new().unwrap();
        let r = reloader(&dir, Duration::from_millis(50));
        let err = r
            .with_timeout("sync", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_write_config_and_hooks() {
        let dir = TempDir::new().unwrap();
        let r = reloader(&dir, Duration::from_secs(1));

        r.write_config("[Interface]\nListenPort = 51820\n").await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("wg0.conf")).unwrap();
        assert_eq!(written, "[Interface]\nListenPort = 51820\n");

        std::fs::create_dir_all(dir.path().join("hooks")).unwrap();
        std::fs::write(dir.path().join("hooks/postup.sh"), "#!/bin/sh\niptables -A\n").unwrap();
        r.ensure_hooks().await.unwrap();

        let kept = std::fs::read_to_string(dir.path().join("hooks/postup.sh")).unwrap();
        assert!(kept.contains("iptables"));
        assert!(dir.path().join("hooks/predown.sh").exists());
        assert!(dir.path().join("hooks/postdown.sh").exists());
    }
}
