//! Job table entries and scheduler state.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::trigger::Trigger;

/// Id prefix shared by all announcement jobs so a reschedule can sweep them.
pub const ANNOUNCE_ID_PREFIX: &str = "announce-";

/// Scheduler lifecycle state.
///
/// `Paused` is representable (and travels over the wire) but no current
/// operation produces it; it is reserved for a future pause/resume control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SchedulerState {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stopped" => Ok(SchedulerState::Stopped),
            "running" => Ok(SchedulerState::Running),
            "paused" => Ok(SchedulerState::Paused),
            _ => Err(()),
        }
    }
}

/// What a job does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    WorldBackup,
    ServerBackup,
    RescheduleAnnouncements,
    Announce { lead_minutes: u32 },
}

/// One entry in the engine's job table.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub kind: JobKind,
    pub trigger: Trigger,
    pub next_run_time: Option<NaiveDateTime>,
    /// Set while a firing is in flight; the tick loop never re-enters a
    /// running job.
    pub running: bool,
}

impl Job {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: JobKind, trigger: Trigger) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            trigger,
            next_run_time: None,
            running: false,
        }
    }

    pub fn is_announcement(&self) -> bool {
        self.id.starts_with(ANNOUNCE_ID_PREFIX)
    }
}

/// Read-only projection of a job handed to the RPC layer and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: String,
    pub name: String,
    pub trigger: String,
    pub next_run_time: Option<NaiveDateTime>,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            trigger: job.trigger.describe(),
            next_run_time: job.next_run_time,
        }
    }
}
