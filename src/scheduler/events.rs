//! Structured progress events emitted by the scheduler engine.
//!
//! The engine reports what it is doing through an [`EventSink`] chosen by the
//! caller: the daemon installs a tracing-backed sink, the foreground CLI mode
//! prints to stdout, tests collect events into a vector.

use chrono::NaiveDateTime;

/// One step of the server backup cycle, named in failure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStep {
    RecordStopTime,
    StopServer,
    CreateArchive,
    Cleanup,
    Prune,
    StartServer,
    RecordStartTime,
}

impl BackupStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordStopTime => "record stop time",
            Self::StopServer => "stop server",
            Self::CreateArchive => "create archive",
            Self::Cleanup => "cleanup",
            Self::Prune => "prune",
            Self::StartServer => "start server",
            Self::RecordStartTime => "record start time",
        }
    }

    /// Whether the stop command had been issued by the time this step ran.
    /// The best-effort restart is only attempted in that case.
    pub fn server_stop_issued(&self) -> bool {
        !matches!(self, Self::RecordStopTime)
    }
}

impl std::fmt::Display for BackupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Started,
    Stopped,
    JobAdvanced {
        name: String,
        new_time: NaiveDateTime,
    },
    WorldBackupStarted,
    WorldBackupFinished {
        message: String,
    },
    WorldBackupFailed {
        error: String,
    },
    BackupCycleStarted,
    BackupCycleStep {
        step: BackupStep,
        message: String,
    },
    BackupCycleFinished,
    BackupCycleFailed {
        step: BackupStep,
        error: String,
    },
    RecoveryRestartAttempted,
    RecoveryRestartSkipped {
        step: BackupStep,
    },
    Announced {
        lead_minutes: u32,
        message: String,
    },
    AnnouncementFailed {
        error: String,
    },
    AnnouncementsScheduled {
        next_backup: NaiveDateTime,
        count: usize,
    },
}

impl std::fmt::Display for SchedulerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "Scheduler started"),
            Self::Stopped => write!(f, "Scheduler stopped"),
            Self::JobAdvanced { name, new_time } => {
                write!(f, "Advanced job '{}' to {}", name, new_time)
            }
            Self::WorldBackupStarted => write!(f, "Running world backup..."),
            Self::WorldBackupFinished { message } => {
                write!(f, "World backup complete: {}", message)
            }
            Self::WorldBackupFailed { error } => write!(f, "World backup failed: {}", error),
            Self::BackupCycleStarted => write!(f, "Starting server backup cycle..."),
            Self::BackupCycleStep { step, message } => write!(f, "[{}] {}", step, message),
            Self::BackupCycleFinished => write!(f, "Server backup cycle complete"),
            Self::BackupCycleFailed { step, error } => {
                write!(f, "Server backup failed at step '{}': {}", step, error)
            }
            Self::RecoveryRestartAttempted => {
                write!(f, "Attempting to restart server after failed backup...")
            }
            Self::RecoveryRestartSkipped { step } => write!(
                f,
                "Server was never stopped (failed at '{}'), skipping restart",
                step
            ),
            Self::Announced {
                lead_minutes,
                message,
            } => write!(f, "Announced ({}m): {}", lead_minutes, message),
            Self::AnnouncementFailed { error } => write!(f, "Failed to announce: {}", error),
            Self::AnnouncementsScheduled { next_backup, count } => write!(
                f,
                "Scheduled {} announcement(s) for backup at {}",
                count, next_backup
            ),
        }
    }
}

/// Destination for engine progress events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

/// Sink that forwards events to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SchedulerEvent) {
        match &event {
            SchedulerEvent::WorldBackupFailed { .. }
            | SchedulerEvent::BackupCycleFailed { .. }
            | SchedulerEvent::AnnouncementFailed { .. } => tracing::warn!("{}", event),
            _ => tracing::info!("{}", event),
        }
    }
}

/// Sink that prints events to stdout; used by the foreground scheduler mode.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: SchedulerEvent) {
        println!("{}", event);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that collects events for assertions.
    #[derive(Debug, Default)]
    pub struct CollectingSink {
        events: Mutex<Vec<SchedulerEvent>>,
    }

    impl CollectingSink {
        pub fn events(&self) -> Vec<SchedulerEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for CollectingSink {
        fn emit(&self, event: SchedulerEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
