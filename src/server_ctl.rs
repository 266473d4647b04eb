//! Server process control.
//!
//! The dedicated server ships a `server.sh` control script; everything here
//! wraps that script. The scheduler engine only sees the [`ServerControl`]
//! trait so tests can substitute a mock.

use std::path::PathBuf;
use std::process::Command;

use crate::config::Config;
use crate::error::{PalisadeError, Result};

/// Parsed `server.sh status` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatus {
    pub running: bool,
    pub version: Option<String>,
    pub uptime: Option<String>,
    pub players_online: u32,
    pub max_players: u32,
    pub memory_managed: Option<String>,
    pub memory_total: Option<String>,
}

/// Control operations on the underlying server process.
///
/// Every operation may fail with [`PalisadeError::ServerExecutableMissing`]
/// when the control script is absent (e.g. the installation was removed).
pub trait ServerControl: Send + Sync {
    fn start(&self) -> Result<String>;
    fn stop(&self) -> Result<String>;
    fn restart(&self) -> Result<String>;
    fn command(&self, cmd: &str) -> Result<String>;
    fn status(&self) -> Result<ServerStatus>;

    /// Number of players currently connected.
    fn player_count(&self) -> Result<u32>;

    /// Broadcast a message to all connected players.
    fn announce(&self, message: &str) -> Result<String>;
}

/// [`ServerControl`] implementation that shells out to the control script.
#[derive(Debug, Clone)]
pub struct ShellServerControl {
    executable: PathBuf,
}

impl ShellServerControl {
    pub fn new(config: &Config) -> Self {
        Self {
            executable: config.server_executable(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        if !self.executable.exists() {
            return Err(PalisadeError::ServerExecutableMissing(
                self.executable.clone(),
            ));
        }

        let output = Command::new(&self.executable)
            .args(args)
            .output()
            .map_err(|e| {
                PalisadeError::ServerCommand(format!("{}: {}", self.executable.display(), e))
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

impl ServerControl for ShellServerControl {
    fn start(&self) -> Result<String> {
        self.run(&["start"])
    }

    fn stop(&self) -> Result<String> {
        self.run(&["stop"])
    }

    fn restart(&self) -> Result<String> {
        self.run(&["restart"])
    }

    fn command(&self, cmd: &str) -> Result<String> {
        self.run(&["command", cmd])
    }

    fn status(&self) -> Result<ServerStatus> {
        let output = self.run(&["status"])?;
        Ok(parse_status(&output))
    }

    fn player_count(&self) -> Result<u32> {
        let output = self.command("list clients")?;
        Ok(count_player_lines(&output))
    }

    fn announce(&self, message: &str) -> Result<String> {
        self.command(&format!("announce {}", message))
    }
}

/// Parse the human-readable status report the control script prints.
fn parse_status(output: &str) -> ServerStatus {
    let running = output.contains("is up and running");
    if !running {
        return ServerStatus::default();
    }

    let mut status = ServerStatus {
        running: true,
        ..ServerStatus::default()
    };

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Version:") {
            status.version = first_token(rest);
        } else if let Some(rest) = line.strip_prefix("Uptime:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                status.uptime = Some(rest.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("Players online:") {
            if let Some((online, max)) = parse_ratio(rest) {
                status.players_online = online;
                status.max_players = max;
            }
        } else if let Some(rest) = line.strip_prefix("Memory usage Managed/Total:") {
            let mut parts = rest.split('/');
            status.memory_managed = parts.next().and_then(first_token);
            status.memory_total = parts.next().and_then(first_token);
        }
    }

    status
}

fn first_token(s: &str) -> Option<String> {
    s.split_whitespace().next().map(str::to_string)
}

fn parse_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let online = parts.next()?.trim().parse().ok()?;
    let max = parts.next()?.trim().parse().ok()?;
    Some((online, max))
}

/// Count player entries in `list clients` output.
///
/// Player lines look like `[12] PlayerName 198.51.100.7:61432`.
fn count_player_lines(output: &str) -> u32 {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            let Some(rest) = line.strip_prefix('[') else {
                return false;
            };
            let Some((id, tail)) = rest.split_once(']') else {
                return false;
            };
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            let fields: Vec<&str> = tail.split_whitespace().collect();
            fields.len() == 2 && fields[1].contains(':')
        })
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_OUTPUT: &str = "\
Server is up and running
  Version: 1.20.4
  Uptime: 3 days, 4:12:09
  Players online: 3 / 16
  Memory usage Managed/Total: 1.2G / 3.4G
";

    #[test]
    fn test_parse_status_running() {
        let status = parse_status(STATUS_OUTPUT);
        assert!(status.running);
        assert_eq!(status.version.as_deref(), Some("1.20.4"));
        assert_eq!(status.uptime.as_deref(), Some("3 days, 4:12:09"));
        assert_eq!(status.players_online, 3);
        assert_eq!(status.max_players, 16);
        assert_eq!(status.memory_managed.as_deref(), Some("1.2G"));
        assert_eq!(status.memory_total.as_deref(), Some("3.4G"));
    }

    #[test]
    fn test_parse_status_not_running() {
        let status = parse_status("Server is stopped\n");
        assert!(!status.running);
        assert_eq!(status.players_online, 0);
    }

    #[test]
    fn test_count_player_lines() {
        let output = "\
Connected clients:
[1] Aldric 198.51.100.7:61432
[2] Brann 203.0.113.9:52011
not a player line
[x] Malformed 1.2.3.4:5
";
        assert_eq!(count_player_lines(output), 2);
    }

    #[test]
    fn test_missing_executable() {
        let control = ShellServerControl {
            executable: PathBuf::from("/nonexistent/server.sh"),
        };
        let err = control.start().unwrap_err();
        assert!(matches!(err, PalisadeError::ServerExecutableMissing(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_stdout_and_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("server.sh");
        std::fs::write(&script, "#!/bin/sh\necho out: $1\necho err >&2\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let control = ShellServerControl { executable: script };
        let output = control.run(&["status"]).unwrap();
        assert!(output.contains("out: status"));
        assert!(output.contains("err"));
    }
}
