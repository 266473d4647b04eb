//! Backup operations.
//!
//! Two backup families exist: *world* backups delegate to the server's own
//! `genbackup` command and land in the data directory, while *server* backups
//! archive the entire data directory into a tar.gz under the server
//! installation. After a server backup the world-backup folder and loose log
//! files are cleared, since the archive already contains them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::config::Config;
use crate::error::{PalisadeError, Result};
use crate::server_ctl::ServerControl;

const ARCHIVE_PREFIXES: [&str; 3] = ["backup-", "manual-", "scheduled-"];

/// Backup operations the scheduler engine calls out to.
pub trait BackupOps: Send + Sync {
    /// Trigger the server's built-in world snapshot.
    fn world_backup(&self) -> Result<String>;

    /// Archive the data directory into a new server backup.
    fn server_backup(&self) -> Result<String>;

    /// Clear data that the server backup just duplicated.
    fn cleanup_after_server_backup(&self) -> Result<String>;

    /// Delete the oldest archives beyond the retention limit.
    fn prune_old_backups(&self) -> Result<String>;
}

/// [`BackupOps`] implementation producing tar.gz archives on disk.
pub struct ArchiveBackupOps {
    config: Config,
    server: Arc<dyn ServerControl>,
    manual: bool,
}

impl ArchiveBackupOps {
    pub fn new(config: Config, server: Arc<dyn ServerControl>) -> Self {
        Self {
            config,
            server,
            manual: false,
        }
    }

    /// Label archives as `manual-` instead of `scheduled-`; used by the CLI.
    pub fn manual(mut self) -> Self {
        self.manual = true;
        self
    }

    /// All server backup archives, newest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let dir = self.config.server_backups_path();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_archive(&path) {
                continue;
            }
            let mtime = entry
                .metadata()?
                .modified()
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            backups.push((mtime, path));
        }

        backups.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }
}

impl BackupOps for ArchiveBackupOps {
    fn world_backup(&self) -> Result<String> {
        self.server.command("genbackup")
    }

    fn server_backup(&self) -> Result<String> {
        let data_path = self.config.data_path();
        if !data_path.exists() {
            return Err(PalisadeError::Backup(format!(
                "data directory not found: {}",
                data_path.display()
            )));
        }

        let backups_path = self.config.server_backups_path();
        std::fs::create_dir_all(&backups_path)?;

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let kind = if self.manual { "manual" } else { "scheduled" };
        let archive_path = backups_path.join(format!("{}-{}.tar.gz", kind, timestamp));

        // Fast compression; the data directory can be large and the server is
        // down for the duration.
        let file = std::fs::File::create(&archive_path)?;
        let encoder = GzEncoder::new(file, Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        let root_name = data_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string());
        builder
            .append_dir_all(&root_name, &data_path)
            .map_err(|e| PalisadeError::Backup(format!("archiving failed: {}", e)))?;
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| PalisadeError::Backup(format!("archiving failed: {}", e)))?;

        Ok(format!("Server backup created: {}", archive_path.display()))
    }

    fn cleanup_after_server_backup(&self) -> Result<String> {
        let mut messages = Vec::new();

        let world_backups = self.config.world_backups_path();
        if world_backups.exists() {
            for entry in std::fs::read_dir(&world_backups)? {
                let path = entry?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(&path)?;
                } else {
                    std::fs::remove_file(&path)?;
                }
            }
            messages.push(format!("Cleared world backups: {}", world_backups.display()));
        }

        // Loose log files go; the Archive subdirectory stays
        let logs_path = self.config.logs_path();
        if logs_path.exists() {
            for entry in std::fs::read_dir(&logs_path)? {
                let path = entry?.path();
                if path.is_file() {
                    std::fs::remove_file(&path)?;
                    if let Some(name) = path.file_name() {
                        messages.push(format!("Removed log file: {}", name.to_string_lossy()));
                    }
                }
            }
        }

        if messages.is_empty() {
            Ok("Nothing to clean up".to_string())
        } else {
            Ok(messages.join("\n"))
        }
    }

    fn prune_old_backups(&self) -> Result<String> {
        let max = self.config.max_server_backups;
        let backups = self.list_backups()?;

        if backups.len() <= max {
            return Ok(format!("No pruning needed ({}/{} backups)", backups.len(), max));
        }

        let mut removed = Vec::new();
        for path in &backups[max..] {
            std::fs::remove_file(path)?;
            if let Some(name) = path.file_name() {
                removed.push(name.to_string_lossy().into_owned());
            }
        }

        Ok(format!(
            "Pruned {} old backup(s): {}",
            removed.len(),
            removed.join(", ")
        ))
    }
}

fn is_archive(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".tar.gz") && ARCHIVE_PREFIXES.iter().any(|p| name.starts_with(p))
}
