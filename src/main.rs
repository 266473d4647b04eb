use clap::Parser;
use std::process::ExitCode;

use palisade::cli::args::{Cli, Commands};
use palisade::cli::{backup, config as config_cmd, daemon, jobs, schedule, server};
use palisade::error::exit_codes;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> palisade::Result<()> {
    let config = palisade::config::load()?;

    match cli.command {
        Commands::Server { action } => server::server(action, &config).await?,

        Commands::Backup { action } => backup::backup(action, &config).await?,

        Commands::Schedule { action } => schedule::schedule(action, &config).await?,

        Commands::Daemon { action } => daemon::daemon(action, &config).await?,

        Commands::Jobs => jobs::jobs(&config).await?,

        Commands::Advance { minutes } => jobs::advance(minutes, &config).await?,

        Commands::Config { action } => config_cmd::config(action, &config).await?,
    }

    Ok(())
}
