//! `palisade daemon` - lifecycle of the background daemon process.

use crate::cli::args::DaemonAction;
use crate::config::Config;
use crate::daemon::client::DaemonClient;
use crate::daemon::lifecycle::{self, DaemonFiles};
use crate::error::{PalisadeError, Result};

pub async fn daemon(action: DaemonAction, config: &Config) -> Result<()> {
    let files = DaemonFiles::resolve()?;

    match action {
        DaemonAction::Start => {
            let pid = lifecycle::start_daemon(&files).await?;
            println!("Daemon started (pid {})", pid);
        }
        DaemonAction::Stop => {
            let pid = lifecycle::stop_daemon(&files).await?;
            println!("Daemon stopped (pid {})", pid);
        }
        DaemonAction::Restart => {
            match lifecycle::stop_daemon(&files).await {
                Ok(pid) => println!("Daemon stopped (pid {})", pid),
                Err(PalisadeError::DaemonNotRunning) => {}
                Err(e) => return Err(e),
            }
            let pid = lifecycle::start_daemon(&files).await?;
            println!("Daemon started (pid {})", pid);
        }
        DaemonAction::Status => status(&files, config).await?,
    }

    Ok(())
}

async fn status(files: &DaemonFiles, config: &Config) -> Result<()> {
    let Some(pid) = lifecycle::running_daemon_pid(files) else {
        return Err(PalisadeError::DaemonNotRunning);
    };

    println!("Daemon is running (pid {})", pid);
    if !files.is_ready() {
        println!("RPC endpoint is still starting");
        return Ok(());
    }

    let client = DaemonClient::new(config);
    match client.get_status().await {
        Ok(state) => println!("Scheduler: {}", state),
        Err(e) => println!(
            "Daemon is unreachable at {}:{} ({})",
            config.rpc_host, config.rpc_port, e
        ),
    }

    Ok(())
}
