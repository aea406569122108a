//! `pryx-vault backups`: list snapshots of the vault file.

use crate::cli::output;
use crate::cli::{context, Cli};
use crate::errors::Result;

/// Execute the `backups` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = context(cli)?;
    let backups = ctx.storage.list_backups(&ctx.vault_path)?;
    output::print_backups_table(&backups);
    Ok(())
}
