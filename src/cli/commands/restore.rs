//! `pryx-vault restore`: replace the vault file with a snapshot.

use std::path::Path;

use crate::cli::output;
use crate::cli::{confirm, context, Cli};
use crate::errors::{PryxVaultError, Result};
use crate::storage::backup;

/// Execute the `restore` command.
pub async fn execute(cli: &Cli, backup_path: Option<&Path>, force: bool) -> Result<()> {
    let ctx = context(cli)?;

    let source = match backup_path {
        Some(path) => path.to_path_buf(),
        None => {
            let name = backup::file_name(&ctx.vault_path)?;
            ctx.storage
                .backup_manager()
                .latest_backup(&name)
                .map(|info| info.path)
                .ok_or_else(|| {
                    PryxVaultError::CommandFailed(format!(
                        "no backups of {} found",
                        ctx.vault_path.display()
                    ))
                })?
        }
    };

    if !force
        && !confirm(&format!(
            "Replace {} with {}?",
            ctx.vault_path.display(),
            source.display()
        ))?
    {
        output::info("Cancelled.");
        return Ok(());
    }

    let vault = ctx.storage.restore_from_backup(&source, &ctx.vault_path)?;

    output::success(&format!(
        "Restored {} entries from {}",
        vault.entries.len(),
        source.display()
    ));
    Ok(())
}
