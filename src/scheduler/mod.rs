//! Recurring-job scheduling for backups and announcements.
//!
//! ## Components
//!
//! - [`trigger`]: typed triggers and backup hour-set computation
//! - [`job`]: job table entries, snapshots, scheduler state
//! - [`engine`]: the scheduler engine (tick loop, backup-cycle orchestration)
//! - [`events`]: structured progress events and the [`EventSink`] trait

pub mod engine;
pub mod events;
pub mod job;
pub mod trigger;

pub use engine::{ANNOUNCEMENT_LEAD_MINUTES, BackupSchedule, Collaborators, SchedulerEngine};
pub use events::{BackupStep, ConsoleSink, EventSink, SchedulerEvent, TracingSink};
pub use job::{Job, JobKind, JobSnapshot, SchedulerState};
pub use trigger::{Trigger, backup_hours, world_only_hours};
