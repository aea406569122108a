//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::storage::{BackupInfo, EntryMetadata, IntegrityReport};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of entry metadata.
pub fn print_entries_table(entries: &[EntryMetadata]) {
    if entries.is_empty() {
        info("No entries in this vault yet.");
        tip("Run `pryx-vault add <NAME>` to add your first entry.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Type", "Name", "Updated", "Accessed"]);

    for e in entries {
        let accessed = match e.last_accessed_at {
            Some(at) => format!(
                "{} ({}x)",
                at.format("%Y-%m-%d %H:%M:%S"),
                e.access_count
            ),
            None => "never".to_string(),
        };
        table.add_row(vec![
            e.id.clone(),
            e.entry_type.to_string(),
            e.name.clone(),
            e.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            accessed,
        ]);
    }

    println!("{table}");
}

/// Print a table of backups, newest first.
pub fn print_backups_table(backups: &[BackupInfo]) {
    if backups.is_empty() {
        info("No backups found.");
        tip("Run `pryx-vault backup` to create one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Created", "Size", "Path"]);

    for b in backups {
        table.add_row(vec![
            b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{} B", b.size),
            b.path.display().to_string(),
        ]);
    }

    println!("{table}");
}

/// Print the outcome of an integrity check.
pub fn print_integrity_report(report: &IntegrityReport) {
    if report.valid {
        success(&format!(
            "Vault is intact ({} entr{})",
            report.entry_count,
            if report.entry_count == 1 { "y" } else { "ies" }
        ));
        return;
    }

    for problem in &report.errors {
        warning(problem);
    }
    error(&format!(
        "{} of {} entries failed to decrypt",
        report.corrupted_entries.len(),
        report.entry_count
    ));
}
