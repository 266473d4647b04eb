//! Human-readable rendering for CLI output.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDateTime};
use tabled::{Table, Tabled};

use crate::config::Config;
use crate::daemon::protocol::JobEntry;
use crate::server_ctl::ServerStatus;

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Next Run")]
    next_run: String,
    #[tabled(rename = "In")]
    until: String,
}

pub fn format_jobs(jobs: &[JobEntry], now: NaiveDateTime) -> String {
    if jobs.is_empty() {
        return "No jobs scheduled.\n".to_string();
    }
    let rows: Vec<JobRow> = jobs
        .iter()
        .map(|job| JobRow {
            id: job.id.clone(),
            name: job.name.clone(),
            trigger: job.trigger.clone(),
            next_run: job.next_run_time.clone().unwrap_or_else(|| "-".to_string()),
            until: job
                .parsed_next_run()
                .map(|next| humanize_until(now, next))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

pub fn format_backups(backups: &[PathBuf]) -> String {
    if backups.is_empty() {
        return "No backups found.\n".to_string();
    }
    let rows: Vec<BackupRow> = backups
        .iter()
        .map(|path| {
            let metadata = std::fs::metadata(path).ok();
            BackupRow {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                size: metadata
                    .as_ref()
                    .map(|m| format_size(m.len()))
                    .unwrap_or_else(|| "-".to_string()),
                modified: metadata
                    .and_then(|m| m.modified().ok())
                    .map(|t| {
                        DateTime::<Local>::from(t)
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()
                    })
                    .unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();
    Table::new(rows).to_string()
}

pub fn format_server_status(status: &ServerStatus) -> String {
    if !status.running {
        return "Server is not running\n".to_string();
    }

    let mut output = String::new();
    output.push_str("Server is running\n");
    if let Some(version) = &status.version {
        output.push_str(&format!("  Version: {}\n", version));
    }
    if let Some(uptime) = &status.uptime {
        output.push_str(&format!("  Uptime:  {}\n", uptime));
    }
    output.push_str(&format!(
        "  Players: {} / {}\n",
        status.players_online, status.max_players
    ));
    if let (Some(managed), Some(total)) = (&status.memory_managed, &status.memory_total) {
        output.push_str(&format!("  Memory:  {} / {}\n", managed, total));
    }
    output
}

pub fn format_config(config: &Config) -> String {
    let mut output = String::new();
    output.push_str(&format!("  data_path:              {}\n", config.data_path.display()));
    output.push_str(&format!("  server_path:            {}\n", config.server_path.display()));
    output.push_str(&format!("  world_backup_interval:  {}\n", config.world_backup_interval));
    output.push_str(&format!("  server_backup_interval: {}\n", config.server_backup_interval));
    output.push_str(&format!("  backup_offset:          {}\n", config.backup_offset));
    output.push_str(&format!("  max_server_backups:     {}\n", config.max_server_backups));
    output.push_str(&format!("  rpc_host:               {}\n", config.rpc_host));
    output.push_str(&format!("  rpc_port:               {}\n", config.rpc_port));
    output
}

/// "2h 14m" style time-until; past instants read "due".
fn humanize_until(now: NaiveDateTime, next: NaiveDateTime) -> String {
    let minutes = (next - now).num_minutes();
    if minutes < 0 {
        return "due".to_string();
    }
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
