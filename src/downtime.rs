//! Downtime tracking for backup announcements.
//!
//! A server backup cycle takes the server offline for a few minutes. The
//! engine records when the stop began and when the server came back, and the
//! announcement text quotes the previous cycle's duration as an estimate.
//! The record is a single JSON file next to the server backups.

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;

/// Persisted downtime record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DowntimeRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_downtime_seconds: Option<i64>,
}

/// Records server stop/start times around a backup cycle.
pub trait DowntimeTracker: Send + Sync {
    /// Record the timestamp when the server stop begins.
    fn record_stop_time(&self) -> Result<()>;

    /// Record the timestamp when the server is back online and compute the
    /// elapsed downtime when a stop time exists.
    fn record_start_time(&self) -> Result<()>;

    /// Formatted downtime estimate for announcements, or `None` when no
    /// previous cycle has been recorded.
    fn format_estimate(&self) -> Result<Option<String>>;
}

/// [`DowntimeTracker`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileDowntimeTracker {
    path: PathBuf,
}

impl FileDowntimeTracker {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.downtime_path(),
        }
    }

    #[cfg(test)]
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<DowntimeRecord> {
        if !self.path.exists() {
            return Ok(DowntimeRecord::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn store(&self, record: &DowntimeRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so readers never observe a partial record
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DowntimeTracker for FileDowntimeTracker {
    fn record_stop_time(&self) -> Result<()> {
        let mut record = self.load()?;
        record.stop_time = Some(Local::now().naive_local());
        self.store(&record)
    }

    fn record_start_time(&self) -> Result<()> {
        let mut record = self.load()?;
        let start = Local::now().naive_local();
        record.start_time = Some(start);
        if let Some(stop) = record.stop_time {
            record.last_downtime_seconds = Some((start - stop).num_seconds().max(0));
        }
        self.store(&record)
    }

    fn format_estimate(&self) -> Result<Option<String>> {
        let record = self.load()?;
        Ok(record.last_downtime_seconds.map(format_minutes))
    }
}

/// Round seconds up to whole minutes and phrase the estimate.
fn format_minutes(seconds: i64) -> String {
    let minutes = (seconds.max(0) + 59) / 60;
    if minutes == 1 {
        "(estimated downtime: 1 minute)".to_string()
    } else {
        format!("(estimated downtime: {} minutes)", minutes)
    }
}
