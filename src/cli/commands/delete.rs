//! `pryx-vault delete`: remove an entry from the vault.

use crate::cli::output;
use crate::cli::{confirm, context, prompt_password, Cli};
use crate::errors::Result;

/// Execute the `delete` command.
pub async fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force && !confirm(&format!("Delete entry '{id}'?"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    let ctx = context(cli)?;
    let password = prompt_password()?;
    let mut vault = ctx
        .storage
        .load(&ctx.vault_path, password.as_bytes())
        .await?;

    ctx.storage.delete_entry(&mut vault, id)?;
    ctx.storage.save(&ctx.vault_path, &mut vault)?;

    output::success(&format!("Deleted entry '{id}'"));
    Ok(())
}
