//! `palisade server` - direct control of the game server process.

use crate::cli::args::ServerAction;
use crate::config::Config;
use crate::error::Result;
use crate::output::table;
use crate::server_ctl::{ServerControl, ShellServerControl};

pub async fn server(action: ServerAction, config: &Config) -> Result<()> {
    let control = ShellServerControl::new(config);

    match action {
        ServerAction::Start => print!("{}", control.start()?),
        ServerAction::Stop => print!("{}", control.stop()?),
        ServerAction::Restart => print!("{}", control.restart()?),
        ServerAction::Status => {
            let status = control.status()?;
            print!("{}", table::format_server_status(&status));
        }
        ServerAction::Command { text } => print!("{}", control.command(&text)?),
    }

    Ok(())
}
