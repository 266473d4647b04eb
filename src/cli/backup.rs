//! `palisade backup` - one-off backups, listing and pruning.

use std::sync::Arc;

use crate::backup::{ArchiveBackupOps, BackupOps};
use crate::cli::args::BackupAction;
use crate::config::Config;
use crate::error::Result;
use crate::output::table;
use crate::server_ctl::ShellServerControl;

pub async fn backup(action: BackupAction, config: &Config) -> Result<()> {
    let server = Arc::new(ShellServerControl::new(config));
    let ops = ArchiveBackupOps::new(config.clone(), server);

    match action {
        BackupAction::World => print!("{}", ops.world_backup()?),
        BackupAction::Server { manual } => {
            let ops = if manual { ops.manual() } else { ops };
            println!("{}", ops.server_backup()?);
        }
        BackupAction::List => {
            let backups = ops.list_backups()?;
            print!("{}", table::format_backups(&backups));
        }
        BackupAction::Prune => println!("{}", ops.prune_old_backups()?),
    }

    Ok(())
}
