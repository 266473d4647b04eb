//! The scheduler engine.
//!
//! Owns the job table and fires due jobs from its own tick task. The engine
//! is constructed explicitly and shared (`Clone` is cheap) with the RPC
//! listener, which may read and mutate the table concurrently with firings:
//! every firing check and every next-run mutation happens under the single
//! table lock, so a job can never fire on a stale time after being advanced.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDateTime};
use tokio_util::sync::CancellationToken;

use crate::backup::BackupOps;
use crate::downtime::DowntimeTracker;
use crate::error::{PalisadeError, Result};
use crate::server_ctl::ServerControl;

use super::events::{BackupStep, EventSink, SchedulerEvent};
use super::job::{ANNOUNCE_ID_PREFIX, Job, JobKind, JobSnapshot, SchedulerState};
use super::trigger::{Trigger, backup_hours, next_hour_in_set, world_only_hours};

/// Lead times (minutes before a server backup) for player announcements.
pub const ANNOUNCEMENT_LEAD_MINUTES: [u32; 6] = [30, 15, 10, 5, 2, 1];

pub const WORLD_BACKUP_JOB_ID: &str = "world-backup";
pub const SERVER_BACKUP_JOB_ID: &str = "server-backup";
pub const RESCHEDULE_JOB_ID: &str = "reschedule-announcements";

/// Backup cadence derived from configuration.
#[derive(Debug, Clone, Copy)]
pub struct BackupSchedule {
    pub world_interval: u8,
    pub server_interval: u8,
    pub offset: u8,
}

impl From<&crate::config::Config> for BackupSchedule {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            world_interval: config.world_backup_interval,
            server_interval: config.server_backup_interval,
            offset: config.backup_offset,
        }
    }
}

/// External collaborators the engine calls out to.
///
/// All calls are blocking (subprocess, archive I/O) and are dispatched
/// through `spawn_blocking` so firings never stall the async contexts.
#[derive(Clone)]
pub struct Collaborators {
    pub server: Arc<dyn ServerControl>,
    pub backups: Arc<dyn BackupOps>,
    pub downtime: Arc<dyn DowntimeTracker>,
}

struct TableState {
    status: SchedulerState,
    jobs: Vec<Job>,
    cancel: Option<CancellationToken>,
}

struct Shared {
    schedule: BackupSchedule,
    collab: Collaborators,
    events: Arc<dyn EventSink>,
    table: Mutex<TableState>,
}

/// Recurring-job scheduler for backups and pre-backup announcements.
#[derive(Clone)]
pub struct SchedulerEngine {
    shared: Arc<Shared>,
}

impl SchedulerEngine {
    pub fn new(
        schedule: BackupSchedule,
        collab: Collaborators,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                schedule,
                collab,
                events,
                table: Mutex::new(TableState {
                    status: SchedulerState::Stopped,
                    jobs: Vec::new(),
                    cancel: None,
                }),
            }),
        }
    }

    /// Start the engine: build the job table from the configured intervals
    /// and spawn the tick task. A no-op when already running. On error the
    /// engine is left Stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let schedule = self.shared.schedule;
        if schedule.world_interval > 24 || schedule.server_interval > 24 {
            return Err(PalisadeError::Scheduler(
                "backup intervals must be between 0 and 24 hours".to_string(),
            ));
        }

        let now = Local::now().naive_local();
        let server_hours = backup_hours(schedule.server_interval, schedule.offset);
        let world_only = world_only_hours(
            schedule.world_interval,
            schedule.server_interval,
            schedule.offset,
        );

        let cancel = CancellationToken::new();
        {
            let mut table = self.shared.table.lock().unwrap();
            if table.status == SchedulerState::Running {
                return Ok(());
            }

            let mut jobs = Vec::new();
            if !world_only.is_empty() {
                jobs.push(Job::new(
                    WORLD_BACKUP_JOB_ID,
                    "World Backup",
                    JobKind::WorldBackup,
                    Trigger::Hourly {
                        hours: world_only,
                        minute: 0,
                    },
                ));
            }
            if !server_hours.is_empty() {
                jobs.push(Job::new(
                    SERVER_BACKUP_JOB_ID,
                    "Server Backup",
                    JobKind::ServerBackup,
                    Trigger::Hourly {
                        hours: server_hours.clone(),
                        minute: 0,
                    },
                ));
                // One minute after each server backup the announcement
                // sub-schedule is recomputed for the following cycle.
                jobs.push(Job::new(
                    RESCHEDULE_JOB_ID,
                    "Reschedule Announcements",
                    JobKind::RescheduleAnnouncements,
                    Trigger::Hourly {
                        hours: server_hours.clone(),
                        minute: 1,
                    },
                ));
            }
            for job in &mut jobs {
                job.next_run_time = job.trigger.next_after(now);
            }

            table.jobs = jobs;
            table.cancel = Some(cancel.clone());
            table.status = SchedulerState::Running;
        }

        if !server_hours.is_empty() {
            self.schedule_next_announcements(now);
        }

        self.shared.events.emit(SchedulerEvent::Started);

        let engine = self.clone();
        tokio::spawn(async move { engine.tick_loop(cancel).await });

        Ok(())
    }

    /// Stop the engine, cancelling all pending jobs. An in-flight firing is
    /// not interrupted; only future firings are prevented. Idempotent.
    pub fn stop(&self) {
        let was_running = {
            let mut table = self.shared.table.lock().unwrap();
            if let Some(cancel) = table.cancel.take() {
                cancel.cancel();
            }
            table.jobs.clear();
            let was_running = table.status == SchedulerState::Running;
            table.status = SchedulerState::Stopped;
            was_running
        };
        if was_running {
            self.shared.events.emit(SchedulerEvent::Stopped);
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.table.lock().unwrap().status
    }

    /// Snapshot of the job table for display.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        let table = self.shared.table.lock().unwrap();
        table.jobs.iter().map(JobSnapshot::from).collect()
    }

    /// Shift every scheduled job earlier by `minutes`. Returns the number of
    /// jobs modified.
    pub fn advance_jobs(&self, minutes: u32) -> usize {
        let mut advanced = Vec::new();
        {
            let mut table = self.shared.table.lock().unwrap();
            for job in &mut table.jobs {
                if let Some(next) = job.next_run_time {
                    let new_time = next - Duration::minutes(minutes as i64);
                    job.next_run_time = Some(new_time);
                    advanced.push((job.name.clone(), new_time));
                }
            }
        }
        for (name, new_time) in &advanced {
            self.shared.events.emit(SchedulerEvent::JobAdvanced {
                name: name.clone(),
                new_time: *new_time,
            });
        }
        advanced.len()
    }

    async fn tick_loop(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.fire_due_jobs(Local::now().naive_local()),
            }
        }
    }

    /// Collect jobs whose time has come and fire each in its own task.
    ///
    /// Recurring jobs are rescheduled under the lock before the firing task
    /// starts; one-shot jobs are removed from the table. The `running` flag
    /// keeps a slow firing from being re-entered by a later tick.
    fn fire_due_jobs(&self, now: NaiveDateTime) {
        let due: Vec<(String, JobKind)> = {
            let mut table = self.shared.table.lock().unwrap();
            if table.status != SchedulerState::Running {
                return;
            }

            let mut due = Vec::new();
            for job in &mut table.jobs {
                if job.running {
                    continue;
                }
                let Some(next) = job.next_run_time else {
                    continue;
                };
                if next > now {
                    continue;
                }
                job.running = true;
                job.next_run_time = job.trigger.next_after(now);
                due.push((job.id.clone(), job.kind));
            }
            // One-shot jobs are spent once fired
            table
                .jobs
                .retain(|job| !(job.running && matches!(job.trigger, Trigger::Once { .. })));
            due
        };

        for (id, kind) in due {
            let engine = self.clone();
            tokio::spawn(async move {
                engine.run_job(kind).await;
                let mut table = engine.shared.table.lock().unwrap();
                if let Some(job) = table.jobs.iter_mut().find(|j| j.id == id) {
                    job.running = false;
                }
            });
        }
    }

    async fn run_job(&self, kind: JobKind) {
        match kind {
            JobKind::WorldBackup => self.run_world_backup().await,
            JobKind::ServerBackup => self.run_server_backup().await,
            JobKind::RescheduleAnnouncements => {
                self.schedule_next_announcements(Local::now().naive_local());
            }
            JobKind::Announce { lead_minutes } => self.send_announcement(lead_minutes).await,
        }
    }

    /// A world backup is a single collaborator call; a failure is logged and
    /// the next occurrence tries again.
    async fn run_world_backup(&self) {
        self.shared.events.emit(SchedulerEvent::WorldBackupStarted);
        let backups = self.shared.collab.backups.clone();
        match tokio::task::spawn_blocking(move || backups.world_backup()).await {
            Ok(Ok(message)) => self
                .shared
                .events
                .emit(SchedulerEvent::WorldBackupFinished { message }),
            Ok(Err(e)) => self
                .shared
                .events
                .emit(SchedulerEvent::WorldBackupFailed {
                    error: e.to_string(),
                }),
            Err(e) => self
                .shared
                .events
                .emit(SchedulerEvent::WorldBackupFailed {
                    error: e.to_string(),
                }),
        }
    }

    /// The full stop/backup/restore cycle.
    ///
    /// Any step's failure aborts the remaining steps. If the stop command had
    /// already been issued, one best-effort restart is attempted and a second
    /// failure swallowed: a failed backup must not leave the server down.
    pub(crate) async fn run_server_backup(&self) {
        self.shared.events.emit(SchedulerEvent::BackupCycleStarted);

        match self.backup_cycle().await {
            Ok(()) => self.shared.events.emit(SchedulerEvent::BackupCycleFinished),
            Err((step, error)) => {
                self.shared
                    .events
                    .emit(SchedulerEvent::BackupCycleFailed { step, error });

                if step.server_stop_issued() {
                    self.shared
                        .events
                        .emit(SchedulerEvent::RecoveryRestartAttempted);
                    let server = self.shared.collab.server.clone();
                    let _ = tokio::task::spawn_blocking(move || server.start()).await;
                } else {
                    self.shared
                        .events
                        .emit(SchedulerEvent::RecoveryRestartSkipped { step });
                }
            }
        }
    }

    async fn backup_cycle(&self) -> std::result::Result<(), (BackupStep, String)> {
        let collab = &self.shared.collab;

        let downtime = collab.downtime.clone();
        self.step(BackupStep::RecordStopTime, move || {
            downtime.record_stop_time().map(|_| String::new())
        })
        .await?;

        let server = collab.server.clone();
        self.step(BackupStep::StopServer, move || server.stop())
            .await?;

        let backups = collab.backups.clone();
        self.step(BackupStep::CreateArchive, move || backups.server_backup())
            .await?;

        let backups = collab.backups.clone();
        self.step(BackupStep::Cleanup, move || {
            backups.cleanup_after_server_backup()
        })
        .await?;

        let backups = collab.backups.clone();
        self.step(BackupStep::Prune, move || backups.prune_old_backups())
            .await?;

        let server = collab.server.clone();
        self.step(BackupStep::StartServer, move || server.start())
            .await?;

        let downtime = collab.downtime.clone();
        self.step(BackupStep::RecordStartTime, move || {
            downtime.record_start_time().map(|_| String::new())
        })
        .await?;

        Ok(())
    }

    /// Run one blocking cycle step, reporting progress through the sink.
    async fn step<F>(
        &self,
        step: BackupStep,
        f: F,
    ) -> std::result::Result<(), (BackupStep, String)>
    where
        F: FnOnce() -> Result<String> + Send + 'static,
    {
        match tokio::task::spawn_blocking(f).await {
            Ok(Ok(message)) => {
                if !message.is_empty() {
                    self.shared
                        .events
                        .emit(SchedulerEvent::BackupCycleStep { step, message });
                }
                Ok(())
            }
            Ok(Err(e)) => Err((step, e.to_string())),
            Err(e) => Err((step, e.to_string())),
        }
    }

    /// Fire a single pre-backup announcement. Nothing is sent when no player
    /// is connected (or the player query fails).
    async fn send_announcement(&self, lead_minutes: u32) {
        let server = self.shared.collab.server.clone();
        let players = tokio::task::spawn_blocking(move || server.player_count())
            .await
            .map(|r| r.unwrap_or(0))
            .unwrap_or(0);
        if players == 0 {
            return;
        }

        let downtime = self.shared.collab.downtime.clone();
        let estimate = tokio::task::spawn_blocking(move || downtime.format_estimate())
            .await
            .ok()
            .and_then(|r| r.ok())
            .flatten();

        let mut message = if lead_minutes == 1 {
            "Server going offline for backup in 1 minute".to_string()
        } else {
            format!("Server going offline for backup in {} minutes", lead_minutes)
        };
        if let Some(estimate) = estimate {
            message.push(' ');
            message.push_str(&estimate);
        }

        let server = self.shared.collab.server.clone();
        let to_send = message.clone();
        match tokio::task::spawn_blocking(move || server.announce(&to_send)).await {
            Ok(Ok(_)) => self.shared.events.emit(SchedulerEvent::Announced {
                lead_minutes,
                message,
            }),
            Ok(Err(e)) => self.shared.events.emit(SchedulerEvent::AnnouncementFailed {
                error: e.to_string(),
            }),
            Err(e) => self.shared.events.emit(SchedulerEvent::AnnouncementFailed {
                error: e.to_string(),
            }),
        }
    }

    /// Recompute the announcement sub-schedule for the next server backup.
    ///
    /// Existing announcement jobs are swept first so overlapping
    /// recomputations never leave duplicates; only instants still in the
    /// future are scheduled.
    fn schedule_next_announcements(&self, now: NaiveDateTime) {
        let schedule = self.shared.schedule;
        let server_hours = backup_hours(schedule.server_interval, schedule.offset);
        let Some(next_backup) = next_hour_in_set(&server_hours, now) else {
            return;
        };

        let count = {
            let mut table = self.shared.table.lock().unwrap();
            table.jobs.retain(|job| !job.is_announcement());

            let mut count = 0;
            for lead in ANNOUNCEMENT_LEAD_MINUTES {
                let at = next_backup - Duration::minutes(lead as i64);
                if at <= now {
                    continue;
                }
                let mut job = Job::new(
                    format!("{}{}", ANNOUNCE_ID_PREFIX, lead),
                    format!("Announce {}m", lead),
                    JobKind::Announce { lead_minutes: lead },
                    Trigger::Once { at },
                );
                job.next_run_time = Some(at);
                table.jobs.push(job);
                count += 1;
            }
            count
        };

        self.shared
            .events
            .emit(SchedulerEvent::AnnouncementsScheduled { next_backup, count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::events::testing::CollectingSink;
    use crate::server_ctl::ServerStatus;
    use chrono::NaiveDate;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockServer {
        calls: StdMutex<Vec<String>>,
        fail_stop: AtomicBool,
        players: std::sync::atomic::AtomicU32,
    }

    impl MockServer {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ServerControl for MockServer {
        fn start(&self) -> Result<String> {
            self.calls.lock().unwrap().push("start".into());
            Ok(String::new())
        }
        fn stop(&self) -> Result<String> {
            self.calls.lock().unwrap().push("stop".into());
            if self.fail_stop.load(Ordering::SeqCst) {
                return Err(PalisadeError::ServerCommand("stop blew up".into()));
            }
            Ok(String::new())
        }
        fn restart(&self) -> Result<String> {
            Ok(String::new())
        }
        fn command(&self, cmd: &str) -> Result<String> {
            self.calls.lock().unwrap().push(cmd.to_string());
            Ok(String::new())
        }
        fn status(&self) -> Result<ServerStatus> {
            Ok(ServerStatus::default())
        }
        fn player_count(&self) -> Result<u32> {
            Ok(self.players.load(Ordering::SeqCst))
        }
        fn announce(&self, message: &str) -> Result<String> {
            self.calls.lock().unwrap().push(format!("announce {}", message));
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct MockBackups {
        calls: StdMutex<Vec<String>>,
    }

    impl BackupOps for MockBackups {
        fn world_backup(&self) -> Result<String> {
            self.calls.lock().unwrap().push("world".into());
            Ok("world done".into())
        }
        fn server_backup(&self) -> Result<String> {
            self.calls.lock().unwrap().push("server".into());
            Ok("archive done".into())
        }
        fn cleanup_after_server_backup(&self) -> Result<String> {
            self.calls.lock().unwrap().push("cleanup".into());
            Ok("cleaned".into())
        }
        fn prune_old_backups(&self) -> Result<String> {
            self.calls.lock().unwrap().push("prune".into());
            Ok("pruned".into())
        }
    }

    #[derive(Default)]
    struct MockDowntime {
        fail_record_stop: AtomicBool,
    }

    impl DowntimeTracker for MockDowntime {
        fn record_stop_time(&self) -> Result<()> {
            if self.fail_record_stop.load(Ordering::SeqCst) {
                return Err(PalisadeError::Backup("downtime file unwritable".into()));
            }
            Ok(())
        }
        fn record_start_time(&self) -> Result<()> {
            Ok(())
        }
        fn format_estimate(&self) -> Result<Option<String>> {
            Ok(Some("(estimated downtime: 2 minutes)".into()))
        }
    }

    struct Fixture {
        engine: SchedulerEngine,
        server: Arc<MockServer>,
        backups: Arc<MockBackups>,
        downtime: Arc<MockDowntime>,
        events: Arc<CollectingSink>,
    }

    fn fixture(schedule: BackupSchedule) -> Fixture {
        let server = Arc::new(MockServer::default());
        let backups = Arc::new(MockBackups::default());
        let downtime = Arc::new(MockDowntime::default());
        let events = Arc::new(CollectingSink::default());
        let engine = SchedulerEngine::new(
            schedule,
            Collaborators {
                server: server.clone(),
                backups: backups.clone(),
                downtime: downtime.clone(),
            },
            events.clone(),
        );
        Fixture {
            engine,
            server,
            backups,
            downtime,
            events,
        }
    }

    fn default_schedule() -> BackupSchedule {
        BackupSchedule {
            world_interval: 1,
            server_interval: 6,
            offset: 0,
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 25)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let f = fixture(default_schedule());
        assert_eq!(f.engine.state(), SchedulerState::Stopped);
        f.engine.start().unwrap();
        assert_eq!(f.engine.state(), SchedulerState::Running);
        f.engine.stop();
        assert_eq!(f.engine.state(), SchedulerState::Stopped);
        // stop is idempotent
        f.engine.stop();
        assert_eq!(f.engine.state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn test_start_registers_expected_jobs() {
        let f = fixture(default_schedule());
        f.engine.start().unwrap();

        let jobs = f.engine.jobs();
        let server = jobs.iter().find(|j| j.id == SERVER_BACKUP_JOB_ID).unwrap();
        assert_eq!(server.trigger, "hours[0,6,12,18] at :00");
        assert!(server.next_run_time.is_some());

        let world = jobs.iter().find(|j| j.id == WORLD_BACKUP_JOB_ID).unwrap();
        // All hours except the server-backup hours
        assert!(!world.trigger.contains("[0,"));
        for h in ["1", "2", "3", "4", "5", "7", "23"] {
            assert!(world.trigger.contains(h), "missing hour {}", h);
        }

        let reschedule = jobs.iter().find(|j| j.id == RESCHEDULE_JOB_ID).unwrap();
        assert_eq!(reschedule.trigger, "hours[0,6,12,18] at :01");
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let f = fixture(default_schedule());
        f.engine.start().unwrap();
        let count = f.engine.jobs().len();
        f.engine.start().unwrap();
        assert_eq!(f.engine.jobs().len(), count);
    }

    #[tokio::test]
    async fn test_zero_intervals_register_nothing() {
        let f = fixture(BackupSchedule {
            world_interval: 0,
            server_interval: 0,
            offset: 0,
        });
        f.engine.start().unwrap();
        assert_eq!(f.engine.state(), SchedulerState::Running);
        assert!(f.engine.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_interval_leaves_engine_stopped() {
        let f = fixture(BackupSchedule {
            world_interval: 1,
            server_interval: 25,
            offset: 0,
        });
        assert!(f.engine.start().is_err());
        assert_eq!(f.engine.state(), SchedulerState::Stopped);
        assert!(f.engine.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_advance_jobs_shifts_and_counts() {
        let f = fixture(default_schedule());
        f.engine.start().unwrap();

        let before: Vec<_> = f.engine.jobs();
        let scheduled = before
            .iter()
            .filter(|j| j.next_run_time.is_some())
            .count();
        let advanced = f.engine.advance_jobs(10);
        assert_eq!(advanced, scheduled);

        let after = f.engine.jobs();
        for (old, new) in before.iter().zip(after.iter()) {
            assert_eq!(old.id, new.id);
            if let (Some(t0), Some(t1)) = (old.next_run_time, new.next_run_time) {
                assert_eq!(t1, t0 - Duration::minutes(10));
            }
        }
    }

    #[tokio::test]
    async fn test_advance_jobs_on_stopped_engine() {
        let f = fixture(default_schedule());
        assert_eq!(f.engine.advance_jobs(5), 0);
    }

    #[tokio::test]
    async fn test_announcement_derivation_only_future_leads() {
        let f = fixture(default_schedule());
        f.engine.start().unwrap();

        // 05:45 → next backup 06:00; the 30m and 15m leads are already past
        // (15m lands exactly on "now" and is excluded)
        f.engine.schedule_next_announcements(at(5, 45));

        let jobs = f.engine.jobs();
        let leads: Vec<String> = jobs
            .iter()
            .filter(|j| j.id.starts_with(ANNOUNCE_ID_PREFIX))
            .map(|j| j.id.clone())
            .collect();
        assert_eq!(leads.len(), 4);
        for lead in ["10", "5", "2", "1"] {
            assert!(leads.contains(&format!("{}{}", ANNOUNCE_ID_PREFIX, lead)));
        }
        for job in jobs.iter().filter(|j| j.id.starts_with(ANNOUNCE_ID_PREFIX)) {
            assert!(job.next_run_time.unwrap() > at(5, 45));
        }
    }

    #[tokio::test]
    async fn test_announcement_reschedule_sweeps_duplicates() {
        let f = fixture(default_schedule());
        f.engine.start().unwrap();

        f.engine.schedule_next_announcements(at(5, 0));
        f.engine.schedule_next_announcements(at(5, 0));

        let announce_count = f
            .engine
            .jobs()
            .iter()
            .filter(|j| j.id.starts_with(ANNOUNCE_ID_PREFIX))
            .count();
        assert_eq!(announce_count, ANNOUNCEMENT_LEAD_MINUTES.len());
    }

    #[tokio::test]
    async fn test_announcement_wraps_past_last_hour() {
        let f = fixture(default_schedule());
        f.engine.start().unwrap();

        // After the 18:00 backup the next one is 00:00 tomorrow
        f.engine.schedule_next_announcements(at(18, 1));
        let events = f.events.events();
        let scheduled = events
            .iter()
            .find_map(|e| match e {
                SchedulerEvent::AnnouncementsScheduled { next_backup, count } => {
                    Some((*next_backup, *count))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(
            scheduled.0,
            NaiveDate::from_ymd_opt(2026, 8, 26)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(scheduled.1, ANNOUNCEMENT_LEAD_MINUTES.len());
    }

    #[tokio::test]
    async fn test_backup_cycle_happy_path() {
        let f = fixture(default_schedule());
        f.engine.run_server_backup().await;

        assert_eq!(
            f.server.calls(),
            vec!["stop".to_string(), "start".to_string()]
        );
        assert_eq!(
            *f.backups.calls.lock().unwrap(),
            vec!["server".to_string(), "cleanup".to_string(), "prune".to_string()]
        );
        assert!(
            f.events
                .events()
                .contains(&SchedulerEvent::BackupCycleFinished)
        );
    }

    #[tokio::test]
    async fn test_backup_cycle_stop_failure_attempts_restart() {
        let f = fixture(default_schedule());
        f.server.fail_stop.store(true, Ordering::SeqCst);
        f.engine.run_server_backup().await;

        // The archive step never ran, but the recovery restart did
        assert!(f.backups.calls.lock().unwrap().is_empty());
        assert_eq!(
            f.server.calls(),
            vec!["stop".to_string(), "start".to_string()]
        );
        let events = f.events.events();
        assert!(events.iter().any(|e| matches!(
            e,
            SchedulerEvent::BackupCycleFailed {
                step: BackupStep::StopServer,
                ..
            }
        )));
        assert!(events.contains(&SchedulerEvent::RecoveryRestartAttempted));
    }

    #[tokio::test]
    async fn test_backup_cycle_pre_stop_failure_skips_restart() {
        let f = fixture(default_schedule());
        f.downtime.fail_record_stop.store(true, Ordering::SeqCst);
        f.engine.run_server_backup().await;

        // Server was never touched
        assert!(f.server.calls().is_empty());
        let events = f.events.events();
        assert!(events.iter().any(|e| matches!(
            e,
            SchedulerEvent::RecoveryRestartSkipped {
                step: BackupStep::RecordStopTime
            }
        )));
    }

    #[tokio::test]
    async fn test_world_backup_failure_is_logged_not_fatal() {
        struct FailingBackups;
        impl BackupOps for FailingBackups {
            fn world_backup(&self) -> Result<String> {
                Err(PalisadeError::Backup("disk full".into()))
            }
            fn server_backup(&self) -> Result<String> {
                unreachable!()
            }
            fn cleanup_after_server_backup(&self) -> Result<String> {
                unreachable!()
            }
            fn prune_old_backups(&self) -> Result<String> {
                unreachable!()
            }
        }

        let server = Arc::new(MockServer::default());
        let events = Arc::new(CollectingSink::default());
        let engine = SchedulerEngine::new(
            default_schedule(),
            Collaborators {
                server,
                backups: Arc::new(FailingBackups),
                downtime: Arc::new(MockDowntime::default()),
            },
            events.clone(),
        );

        engine.run_world_backup().await;
        assert!(events.events().iter().any(|e| matches!(
            e,
            SchedulerEvent::WorldBackupFailed { error } if error.contains("disk full")
        )));
    }

    #[tokio::test]
    async fn test_announcement_skipped_with_no_players() {
        let f = fixture(default_schedule());
        f.engine.send_announcement(5).await;
        assert!(f.server.calls().iter().all(|c| !c.starts_with("announce")));
    }

    #[tokio::test]
    async fn test_announcement_sent_with_players_and_estimate() {
        let f = fixture(default_schedule());
        f.server.players.store(3, Ordering::SeqCst);
        f.engine.send_announcement(5).await;

        let calls = f.server.calls();
        let announce = calls.iter().find(|c| c.starts_with("announce")).unwrap();
        assert!(announce.contains("in 5 minutes"));
        assert!(announce.contains("(estimated downtime: 2 minutes)"));
    }

    #[tokio::test]
    async fn test_announcement_singular_minute() {
        let f = fixture(default_schedule());
        f.server.players.store(1, Ordering::SeqCst);
        f.engine.send_announcement(1).await;

        let calls = f.server.calls();
        let announce = calls.iter().find(|c| c.starts_with("announce")).unwrap();
        assert!(announce.contains("in 1 minute "));
    }

    #[tokio::test]
    async fn test_due_job_fires_and_recurs() {
        let f = fixture(BackupSchedule {
            world_interval: 1,
            server_interval: 0,
            offset: 0,
        });
        f.engine.start().unwrap();

        // Force the world-backup job due and fire it synchronously
        let now = Local::now().naive_local();
        {
            let mut table = f.engine.shared.table.lock().unwrap();
            table.jobs[0].next_run_time = Some(now - Duration::minutes(1));
        }
        f.engine.fire_due_jobs(now);

        // Rescheduled into the future under the same lock as the check
        let jobs = f.engine.jobs();
        assert!(jobs[0].next_run_time.unwrap() > now);

        // Let the spawned firing finish
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if !f.backups.calls.lock().unwrap().is_empty() {
                break;
            }
        }
        assert_eq!(*f.backups.calls.lock().unwrap(), vec!["world".to_string()]);
    }

    #[tokio::test]
    async fn test_running_job_is_not_reentered() {
        let f = fixture(default_schedule());
        f.engine.start().unwrap();

        let now = Local::now().naive_local();
        {
            let mut table = f.engine.shared.table.lock().unwrap();
            let job = table
                .jobs
                .iter_mut()
                .find(|j| j.id == WORLD_BACKUP_JOB_ID)
                .unwrap();
            job.running = true;
            job.next_run_time = Some(now - Duration::minutes(1));
        }
        f.engine.fire_due_jobs(now);

        // Still marked due; the guard kept it from firing again
        let jobs = f.engine.jobs();
        let job = jobs.iter().find(|j| j.id == WORLD_BACKUP_JOB_ID).unwrap();
        assert!(job.next_run_time.unwrap() < now);
        assert!(f.backups.calls.lock().unwrap().is_empty());
    }
}
