//! Daemon process lifecycle: PID file, ready marker, start/stop/health.
//!
//! The daemon leaves two artifacts in `~/.palisade/daemon/`: a plain-text PID
//! file and an empty ready marker created once the RPC listener is bound.
//! Deleting the PID file is an intentional stop signal; the daemon's health
//! loop notices within one poll interval and shuts itself down.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tokio::time::sleep;

use crate::config;
use crate::error::{PalisadeError, Result};

/// How long `start_daemon` waits for the spawned child to register its PID.
const START_GRACE: Duration = Duration::from_secs(2);

/// How long `stop_daemon` waits after SIGTERM before escalating to SIGKILL.
const STOP_GRACE: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Paths of the daemon's on-disk artifacts.
#[derive(Debug, Clone)]
pub struct DaemonFiles {
    pid_path: PathBuf,
    ready_path: PathBuf,
}

impl DaemonFiles {
    /// The default locations under `~/.palisade/daemon/`.
    pub fn resolve() -> Result<Self> {
        Ok(Self {
            pid_path: config::daemon_pid_path()?,
            ready_path: config::daemon_ready_path()?,
        })
    }

    /// Artifacts rooted in an explicit directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            pid_path: dir.join("palisaded.pid"),
            ready_path: dir.join("palisaded.ready"),
        }
    }

    pub fn write_pid(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.pid_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.pid_path, pid.to_string())?;
        Ok(())
    }

    /// The recorded PID, or `None` when the file is absent or unparsable.
    pub fn read_pid(&self) -> Option<u32> {
        let content = std::fs::read_to_string(&self.pid_path).ok()?;
        content.trim().parse().ok()
    }

    pub fn pid_file_present(&self) -> bool {
        self.pid_path.exists()
    }

    pub fn remove_pid(&self) {
        let _ = std::fs::remove_file(&self.pid_path);
    }

    /// Create the ready marker; called after the RPC listener binds.
    pub fn mark_ready(&self) -> Result<()> {
        if let Some(parent) = self.ready_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.ready_path, b"")?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready_path.exists()
    }

    pub fn clear_ready(&self) {
        let _ = std::fs::remove_file(&self.ready_path);
    }
}

/// Whether a process with the given PID is alive.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    // Signal 0 probes existence without sending anything
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    false
}

/// The running daemon's PID, when the PID file names a live process.
pub fn running_daemon_pid(files: &DaemonFiles) -> Option<u32> {
    files.read_pid().filter(|&pid| pid_alive(pid))
}

/// Start the daemon as a detached background process.
///
/// Errors with `DaemonAlreadyRunning` when a live process matches the PID
/// file. The `palisaded` binary is expected next to the current executable;
/// its stdio goes to null since the daemon does its own file logging.
/// Returns the child's PID once it has registered itself.
pub async fn start_daemon(files: &DaemonFiles) -> Result<u32> {
    if let Some(pid) = running_daemon_pid(files) {
        return Err(PalisadeError::DaemonAlreadyRunning(pid));
    }
    // A stale PID file from a crashed daemon must not confuse the poll below
    files.remove_pid();

    spawn_detached()?;

    let deadline = std::time::Instant::now() + START_GRACE;
    while std::time::Instant::now() < deadline {
        sleep(Duration::from_millis(50)).await;
        if let Some(pid) = running_daemon_pid(files) {
            return Ok(pid);
        }
    }

    Err(PalisadeError::DaemonConnection(
        "daemon did not come up; check ~/.palisade/daemon/daemon.log".to_string(),
    ))
}

/// Stop the daemon: SIGTERM, bounded wait, SIGKILL escalation.
///
/// A stale PID file (no live process) is removed and reported as
/// `DaemonNotRunning`. Returns the PID that was stopped.
#[cfg(unix)]
pub async fn stop_daemon(files: &DaemonFiles) -> Result<u32> {
    let Some(pid) = files.read_pid() else {
        return Err(PalisadeError::DaemonNotRunning);
    };
    if !pid_alive(pid) {
        files.remove_pid();
        files.clear_ready();
        return Err(PalisadeError::DaemonNotRunning);
    }

    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }

    let deadline = std::time::Instant::now() + STOP_GRACE;
    while pid_alive(pid) && std::time::Instant::now() < deadline {
        sleep(POLL_INTERVAL).await;
    }

    if pid_alive(pid) {
        tracing::warn!("daemon {} ignored SIGTERM, sending SIGKILL", pid);
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
        }
    }

    files.remove_pid();
    files.clear_ready();
    Ok(pid)
}

#[cfg(not(unix))]
pub async fn stop_daemon(_files: &DaemonFiles) -> Result<u32> {
    Err(PalisadeError::DaemonNotRunning)
}

/// Health predicate evaluated by the daemon's supervisory loop.
///
/// Returns the reason to shut down, or `None` while everything is in order.
pub fn shutdown_reason(files: &DaemonFiles, config_dir: &Path) -> Option<String> {
    if !files.pid_file_present() {
        return Some("PID file removed".to_string());
    }
    match std::env::current_exe() {
        Ok(exe) if exe.exists() => {}
        _ => return Some("daemon executable no longer exists".to_string()),
    }
    if !config_dir.exists() {
        return Some(format!(
            "configuration directory {} no longer exists",
            config_dir.display()
        ));
    }
    None
}

/// Spawn `palisaded` (located next to the current executable) detached.
fn spawn_detached() -> Result<()> {
    use std::process::Stdio;

    let current_exe = std::env::current_exe()?;
    let daemon_path = current_exe.with_file_name("palisaded");
    if !daemon_path.exists() {
        return Err(PalisadeError::DaemonConnection(format!(
            "daemon binary not found at {}",
            daemon_path.display()
        )));
    }

    Command::new(&daemon_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(())
}
