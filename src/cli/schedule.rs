//! `palisade schedule run` - the scheduler in the foreground, no daemon.
//!
//! Useful under a process supervisor or for watching a cycle live; the
//! daemonized path is `palisade daemon start`.

use std::sync::Arc;

use crate::backup::ArchiveBackupOps;
use crate::cli::args::ScheduleAction;
use crate::config::Config;
use crate::downtime::FileDowntimeTracker;
use crate::error::Result;
use crate::scheduler::{BackupSchedule, Collaborators, ConsoleSink, SchedulerEngine};
use crate::server_ctl::ShellServerControl;

pub async fn schedule(action: ScheduleAction, config: &Config) -> Result<()> {
    match action {
        ScheduleAction::Run => run_foreground(config).await,
    }
}

async fn run_foreground(config: &Config) -> Result<()> {
    let server = Arc::new(ShellServerControl::new(config));
    let engine = SchedulerEngine::new(
        BackupSchedule::from(config),
        Collaborators {
            server: server.clone(),
            backups: Arc::new(ArchiveBackupOps::new(config.clone(), server)),
            downtime: Arc::new(FileDowntimeTracker::new(config)),
        },
        Arc::new(ConsoleSink),
    );

    engine.start()?;
    println!("Scheduler running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    engine.stop();
    println!("Scheduler stopped");

    Ok(())
}
