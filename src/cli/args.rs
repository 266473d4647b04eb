use clap::{Parser, Subcommand};

/// Palisade - unattended game-server host manager
#[derive(Parser)]
#[command(name = "palisade")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Control the game server process
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },

    /// Create, list and prune backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Run the backup scheduler in the foreground
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Manage the background daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Show the daemon's scheduled jobs
    Jobs,

    /// Move every scheduled job earlier
    Advance {
        /// Minutes to advance by
        #[arg(long, default_value_t = 1)]
        minutes: u32,
    },

    /// Inspect or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ServerAction {
    /// Start the server process
    Start,
    /// Stop the server process
    Stop,
    /// Restart the server process
    Restart,
    /// Show the server status report
    Status,
    /// Send a raw command to the server console
    Command {
        /// Command text, passed through verbatim
        text: String,
    },
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// Trigger the server's built-in world snapshot
    World,
    /// Archive the whole data directory
    Server {
        /// Label the archive manual- instead of scheduled-
        #[arg(long)]
        manual: bool,
    },
    /// List server backup archives, newest first
    List,
    /// Delete archives beyond the retention limit
    Prune,
}

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Run until Ctrl-C, printing progress to stdout
    Run,
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the background daemon
    Start,
    /// Stop the background daemon
    Stop,
    /// Restart the background daemon
    Restart,
    /// Show daemon and scheduler status
    Status,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Open the config file in $EDITOR
    Edit,
}
