//! `palisade config` - inspect and edit the configuration file.

use crate::cli::args::ConfigAction;
use crate::config::{self, Config};
use crate::error::Result;
use crate::output::table;

pub async fn config(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show => print!("{}", table::format_config(config)),
        ConfigAction::Path => println!("{}", config::config_path()?.display()),
        ConfigAction::Edit => config::edit_config()?,
    }
    Ok(())
}
