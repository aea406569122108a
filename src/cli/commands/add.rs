//! `pryx-vault add`: encrypt and store a new entry.

use crate::cli::output;
use crate::cli::{
    context, parse_payload, prompt_new_password, prompt_password, prompt_payload, vault_is_empty,
    Cli,
};
use crate::errors::Result;
use crate::storage::{EntryData, EntryType};

/// Execute the `add` command.
pub async fn execute(
    cli: &Cli,
    name: &str,
    entry_type: EntryType,
    id: Option<&str>,
    data: Option<&str>,
) -> Result<()> {
    let ctx = context(cli)?;
    // Nothing checks the password of an empty vault, so the first entry
    // asks for it twice.
    let password = if vault_is_empty(&ctx.vault_path)? {
        prompt_new_password()?
    } else {
        prompt_password()?
    };
    let mut vault = ctx
        .storage
        .load(&ctx.vault_path, password.as_bytes())
        .await?;

    let payload = match data {
        Some(raw) => parse_payload(raw)?,
        None => prompt_payload()?,
    };

    let mut entry = EntryData::new(entry_type, name, payload);
    if let Some(id) = id {
        entry = entry.with_id(id);
    }

    let added = ctx
        .storage
        .add_entry(&mut vault, entry, password.as_bytes())
        .await?;
    ctx.storage.save(&ctx.vault_path, &mut vault)?;

    output::success(&format!("Added {} '{}' ({})", added.entry_type, added.name, added.id));
    Ok(())
}
