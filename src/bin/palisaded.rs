//! Palisade daemon - hosts the backup scheduler behind a TCP RPC endpoint.
//!
//! The palisaded binary is a long-running background process that:
//! - Runs the scheduler engine (backups, announcements)
//! - Serves scheduler queries over TCP for the CLI
//! - Handles graceful shutdown on SIGTERM/SIGINT
//! - Shuts itself down when its PID file disappears or the installation is gone
//!
//! ## Usage
//!
//! The daemon is typically started via `palisade daemon start`.
//! Manual start: `palisaded`
//!
//! ## Files
//!
//! - `~/.palisade/daemon/palisaded.pid` - PID file for process tracking
//! - `~/.palisade/daemon/palisaded.ready` - marker created once the RPC listener is up
//! - `~/.palisade/daemon/daemon.log` - daemon log file (daily rotation)

use std::sync::Arc;
use std::time::Duration;

use tokio::select;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;

use palisade::backup::ArchiveBackupOps;
use palisade::config;
use palisade::daemon::lifecycle::{self, DaemonFiles};
use palisade::daemon::listener::RpcListener;
use palisade::downtime::FileDowntimeTracker;
use palisade::scheduler::{BackupSchedule, Collaborators, SchedulerEngine, TracingSink};
use palisade::server_ctl::ShellServerControl;

/// Poll interval for the self-health check.
const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let daemon_dir = config::daemon_dir()?;
    std::fs::create_dir_all(&daemon_dir)?;

    let _guard = init_logging(&daemon_dir)?;

    tracing::info!("palisaded starting, version {}", env!("CARGO_PKG_VERSION"));

    let files = DaemonFiles::resolve()?;
    if let Some(pid) = lifecycle::running_daemon_pid(&files) {
        tracing::error!("another palisaded is already running (pid {})", pid);
        anyhow::bail!("palisaded is already running (pid {})", pid);
    }
    files.write_pid(std::process::id())?;

    // Once the PID file exists, no exit path may leave it behind
    let result = run(&files).await;
    if let Err(e) = &result {
        tracing::error!("palisaded exiting with error: {}", e);
        files.clear_ready();
        files.remove_pid();
    }
    result
}

async fn run(files: &DaemonFiles) -> anyhow::Result<()> {
    let config = config::load()?;
    let config_dir = config::config_dir()?;

    // Wire up the engine with the real collaborators
    let server = Arc::new(ShellServerControl::new(&config));
    let engine = SchedulerEngine::new(
        BackupSchedule::from(&config),
        Collaborators {
            server: server.clone(),
            backups: Arc::new(ArchiveBackupOps::new(config.clone(), server)),
            downtime: Arc::new(FileDowntimeTracker::new(&config)),
        },
        Arc::new(TracingSink),
    );
    engine.start()?;

    let listener = RpcListener::bind(&config, engine.clone()).await?;
    tracing::info!("palisaded listening on {}", listener.local_addr()?);

    let cancel = CancellationToken::new();
    let serve_cancel = cancel.clone();
    let serve_task = tokio::spawn(async move { listener.serve(serve_cancel).await });

    // The listener is bound; the daemon is now operational
    files.mark_ready()?;

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut health_interval = tokio::time::interval(HEALTH_INTERVAL);
    // Skip the first immediate tick
    health_interval.tick().await;

    #[cfg(unix)]
    loop {
        select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, shutting down...");
                break;
            }
            _ = health_interval.tick() => {
                if let Some(reason) = lifecycle::shutdown_reason(&files, &config_dir) {
                    tracing::info!("Health check failed ({}), shutting down...", reason);
                    break;
                }
            }
        }
    }

    #[cfg(not(unix))]
    loop {
        select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                break;
            }
            _ = health_interval.tick() => {
                if let Some(reason) = lifecycle::shutdown_reason(&files, &config_dir) {
                    tracing::info!("Health check failed ({}), shutting down...", reason);
                    break;
                }
            }
        }
    }

    // Graceful shutdown: stop accepting, stop the engine, remove artifacts
    cancel.cancel();
    let _ = serve_task.await;
    engine.stop();
    files.clear_ready();
    files.remove_pid();

    tracing::info!("palisaded shutdown complete");
    Ok(())
}

/// Initialize file-based logging with daily rotation.
///
/// The returned `WorkerGuard` must be kept alive for the duration of the
/// program so buffered log lines are flushed on exit.
fn init_logging(daemon_dir: &std::path::Path) -> anyhow::Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(daemon_dir, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .init();

    Ok(guard)
}
