//! `pryx-vault get`: decrypt and print one entry's payload.

use crate::cli::{context, prompt_password, Cli};
use crate::errors::{PryxVaultError, Result};

/// Execute the `get` command.
pub async fn execute(cli: &Cli, id: &str, field: Option<&str>) -> Result<()> {
    let ctx = context(cli)?;
    let password = prompt_password()?;
    let mut vault = ctx
        .storage
        .load(&ctx.vault_path, password.as_bytes())
        .await?;

    let entry = ctx
        .storage
        .get_entry(&mut vault, id, password.as_bytes())
        .await?;

    // Persist the access bump.  A read is not worth a backup snapshot.
    let storage = ctx.storage.with_backup_on_save(false);
    storage.save(&ctx.vault_path, &mut vault)?;

    match field {
        Some(field) => match entry.data.get(field) {
            Some(serde_json::Value::String(s)) => println!("{s}"),
            Some(other) => println!("{other}"),
            None => {
                return Err(PryxVaultError::CommandFailed(format!(
                    "entry '{id}' has no field '{field}'"
                )));
            }
        },
        None => {
            let json = serde_json::to_string_pretty(&entry.data)
                .map_err(|e| PryxVaultError::CommandFailed(e.to_string()))?;
            println!("{json}");
        }
    }

    Ok(())
}
