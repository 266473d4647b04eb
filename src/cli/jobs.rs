//! `palisade jobs` and `palisade advance` - job table queries over RPC.

use chrono::Local;

use crate::config::Config;
use crate::daemon::client::DaemonClient;
use crate::error::{PalisadeError, Result};
use crate::output::table;

pub async fn jobs(config: &Config) -> Result<()> {
    let client = DaemonClient::new(config);
    let jobs = client.get_jobs().await?;
    print!("{}", table::format_jobs(&jobs, Local::now().naive_local()));
    Ok(())
}

pub async fn advance(minutes: u32, config: &Config) -> Result<()> {
    if minutes == 0 {
        return Err(PalisadeError::InvalidArgument(
            "minutes must be at least 1".to_string(),
        ));
    }

    let client = DaemonClient::new(config);
    let advanced = client.advance_jobs(minutes).await?;
    println!("Advanced {} job(s) by {} minute(s)", advanced, minutes);
    Ok(())
}
