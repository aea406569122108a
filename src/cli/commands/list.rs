//! `pryx-vault list`: show entry metadata in a table.

use crate::cli::output;
use crate::cli::{context, prompt_password, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let ctx = context(cli)?;
    let password = prompt_password()?;
    let vault = ctx
        .storage
        .load(&ctx.vault_path, password.as_bytes())
        .await?;

    let entries = ctx.storage.list_entries(&vault);
    output::info(&format!(
        "{}: {} entr{}",
        ctx.vault_path.display(),
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" }
    ));
    output::print_entries_table(&entries);

    Ok(())
}
