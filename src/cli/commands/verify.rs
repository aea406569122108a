//! `pryx-vault verify`: full integrity check of the vault file.

use crate::cli::output;
use crate::cli::{context, prompt_password, Cli};
use crate::errors::{PryxVaultError, Result, StorageError};
use crate::storage::VaultFile;

/// Execute the `verify` command.
///
/// Unlike the other commands this does not go through `load`, so a
/// partly damaged vault is reported entry by entry instead of refused.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = context(cli)?;
    if !ctx.vault_path.exists() {
        return Err(StorageError::FileNotFound(ctx.vault_path).into());
    }

    let json = std::fs::read_to_string(&ctx.vault_path)?;
    let vault = VaultFile::from_json(&json)?;

    let password = prompt_password()?;
    let report = ctx
        .storage
        .verify_integrity(&vault, Some(password.as_bytes()))
        .await;
    output::print_integrity_report(&report);

    if report.valid {
        Ok(())
    } else {
        Err(PryxVaultError::CommandFailed(
            "integrity check failed".into(),
        ))
    }
}
