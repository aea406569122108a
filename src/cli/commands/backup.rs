//! `pryx-vault backup`: snapshot the vault file.

use crate::cli::output;
use crate::cli::{context, Cli};
use crate::errors::Result;

/// Execute the `backup` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = context(cli)?;
    let path = ctx.storage.create_backup(&ctx.vault_path)?;

    output::success(&format!("Backup written to {}", path.display()));
    output::tip(&format!(
        "Keeping the {} most recent backups.",
        ctx.settings.max_backups
    ));
    Ok(())
}
