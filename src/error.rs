use std::path::PathBuf;

use thiserror::Error;

/// Exit codes reported by the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const INTERNAL: i32 = 1;
    pub const USER_ERROR: i32 = 2;
    pub const NOT_RUNNING: i32 = 3;
    pub const ALREADY_RUNNING: i32 = 4;
}

#[derive(Error, Debug)]
pub enum PalisadeError {
    #[error("Server executable not found: {0}")]
    ServerExecutableMissing(PathBuf),

    #[error("Server command failed: {0}")]
    ServerCommand(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Daemon is already running (PID {0})")]
    DaemonAlreadyRunning(u32),

    #[error("Daemon is not running")]
    DaemonNotRunning,

    #[error("Failed to connect to daemon: {0}")]
    DaemonConnection(String),

    #[error("Daemon protocol error: {0}")]
    DaemonProtocol(String),

    #[error("Daemon error: {0}")]
    DaemonError(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PalisadeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PalisadeError::InvalidArgument(_) => exit_codes::USER_ERROR,

            PalisadeError::DaemonNotRunning | PalisadeError::ServerExecutableMissing(_) => {
                exit_codes::NOT_RUNNING
            }

            PalisadeError::DaemonAlreadyRunning(_) => exit_codes::ALREADY_RUNNING,

            PalisadeError::ServerCommand(_)
            | PalisadeError::Backup(_)
            | PalisadeError::Scheduler(_)
            | PalisadeError::DaemonConnection(_)
            | PalisadeError::DaemonProtocol(_)
            | PalisadeError::DaemonError(_)
            | PalisadeError::Config(_)
            | PalisadeError::Io(_)
            | PalisadeError::Json(_)
            | PalisadeError::Toml(_) => exit_codes::INTERNAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, PalisadeError>;
