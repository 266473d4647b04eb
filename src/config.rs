//! Configuration for the palisade CLI and daemon.
//!
//! Settings live in `~/.palisade/config.toml`. Missing keys fall back to
//! defaults field by field; a present value of the wrong type is a parse
//! error, not a silent fallback. Daemon liveness artifacts (PID file, ready
//! marker, log file) live under `~/.palisade/daemon/`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PalisadeError, Result};

/// Default RPC endpoint for the daemon control protocol.
pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 8585;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server data directory (world saves, logs, world backups)
    pub data_path: PathBuf,
    /// Server installation directory (control script, server backups)
    pub server_path: PathBuf,
    /// Hours between world backups; 0 disables world backups
    pub world_backup_interval: u8,
    /// Hours between full server backups; 0 disables server backups
    pub server_backup_interval: u8,
    /// Hour-of-day offset applied to both backup schedules
    pub backup_offset: u8,
    /// Number of server backup archives to keep
    pub max_server_backups: usize,
    /// Host the daemon RPC listener binds to
    pub rpc_host: String,
    /// Port the daemon RPC listener binds to
    pub rpc_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("/var/gameserver/data"),
            server_path: PathBuf::from("~/server"),
            world_backup_interval: 1,
            server_backup_interval: 6,
            backup_offset: 0,
            max_server_backups: 7,
            rpc_host: DEFAULT_RPC_HOST.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
        }
    }
}

impl Config {
    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_path)
    }

    /// Server installation directory with `~` expanded.
    pub fn server_path(&self) -> PathBuf {
        expand_home(&self.server_path)
    }

    /// Control script used to start/stop/command the server process.
    pub fn server_executable(&self) -> PathBuf {
        self.server_path().join("server.sh")
    }

    /// Directory where the server writes its own world backups.
    pub fn world_backups_path(&self) -> PathBuf {
        self.data_path().join("Backups")
    }

    /// Server log directory.
    pub fn logs_path(&self) -> PathBuf {
        self.data_path().join("Logs")
    }

    /// Directory where full server backup archives are stored.
    pub fn server_backups_path(&self) -> PathBuf {
        self.server_path().join("backups")
    }

    /// Downtime record file, stored next to the server backups.
    pub fn downtime_path(&self) -> PathBuf {
        self.server_backups_path().join(".downtime")
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    path.to_path_buf()
}

/// Get the palisade config directory (~/.palisade)
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".palisade"))
        .ok_or_else(|| PalisadeError::Config("Could not determine home directory".into()))
}

/// Get the path to the config file (~/.palisade/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the daemon directory (~/.palisade/daemon)
pub fn daemon_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("daemon"))
}

/// Get the daemon PID file path (~/.palisade/daemon/palisaded.pid)
pub fn daemon_pid_path() -> Result<PathBuf> {
    Ok(daemon_dir()?.join("palisaded.pid"))
}

/// Get the daemon ready marker path (~/.palisade/daemon/palisaded.ready)
///
/// The marker is created only after the RPC listener has bound, so its
/// absence while the PID file exists means "starting", not "stopped".
pub fn daemon_ready_path() -> Result<PathBuf> {
    Ok(daemon_dir()?.join("palisaded.ready"))
}

/// Get the daemon log path (~/.palisade/daemon/daemon.log)
pub fn daemon_log_path() -> Result<PathBuf> {
    Ok(daemon_dir()?.join("daemon.log"))
}

/// Load the configuration from ~/.palisade/config.toml.
/// Returns defaults if the file doesn't exist.
pub fn load() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }
    load_from(&path)
}

/// Load a configuration from an explicit path.
pub fn load_from(path: &std::path::Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| PalisadeError::Config(format!("{}: {}", path.display(), e)))
}

/// Save the configuration to ~/.palisade/config.toml.
pub fn save(config: &Config) -> Result<()> {
    let path = config_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| PalisadeError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(&path, content)?;
    Ok(())
}

/// Open the config file in the user's editor.
pub fn edit_config() -> Result<()> {
    let path = config_path()?;

    if !path.exists() {
        save(&Config::default())?;
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| "vi".to_string());

    let status = std::process::Command::new(&editor).arg(&path).status()?;

    if !status.success() {
        return Err(PalisadeError::Config(format!(
            "Editor '{}' exited with non-zero status",
            editor
        )));
    }

    Ok(())
}
