//! `pryx-vault init`: create a new, empty vault file.

use crate::cli::output;
use crate::cli::{context, Cli};
use crate::errors::{PryxVaultError, Result};

/// Execute the `init` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = context(cli)?;

    if ctx.vault_path.exists() {
        output::tip("Use `pryx-vault add` to add entries to the existing vault.");
        return Err(PryxVaultError::CommandFailed(format!(
            "vault already exists at {}",
            ctx.vault_path.display()
        )));
    }

    let mut vault = ctx.storage.create_empty_vault();
    ctx.storage.save(&ctx.vault_path, &mut vault)?;

    output::success(&format!("Vault created at {}", ctx.vault_path.display()));
    output::tip("Run `pryx-vault add <NAME>` to add an entry and choose the password.");
    output::tip("Run `pryx-vault list` to see all entries.");

    Ok(())
}
