//! `pryx-vault update`: rename an entry or replace its payload.

use crate::cli::output;
use crate::cli::{context, parse_payload, prompt_password, Cli};
use crate::errors::{PryxVaultError, Result};
use crate::storage::EntryUpdate;

/// Execute the `update` command.
pub async fn execute(cli: &Cli, id: &str, name: Option<&str>, data: Option<&str>) -> Result<()> {
    let updates = EntryUpdate {
        name: name.map(str::to_string),
        data: data.map(parse_payload).transpose()?,
    };
    if updates.is_empty() {
        return Err(PryxVaultError::CommandFailed(
            "nothing to update: pass --name and/or --data".into(),
        ));
    }

    let ctx = context(cli)?;
    let password = prompt_password()?;
    let mut vault = ctx
        .storage
        .load(&ctx.vault_path, password.as_bytes())
        .await?;

    ctx.storage
        .update_entry(&mut vault, id, updates, password.as_bytes())
        .await?;
    ctx.storage.save(&ctx.vault_path, &mut vault)?;

    output::success(&format!("Updated entry '{id}'"));
    Ok(())
}
