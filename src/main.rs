use clap::Parser;
use pryx_vault::cli::commands;
use pryx_vault::cli::{output, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli).await,
        Commands::Add {
            ref name,
            entry_type,
            ref id,
            ref data,
        } => {
            commands::add::execute(&cli, name, entry_type, id.as_deref(), data.as_deref()).await
        }
        Commands::Get { ref id, ref field } => {
            commands::get::execute(&cli, id, field.as_deref()).await
        }
        Commands::List => commands::list::execute(&cli).await,
        Commands::Update {
            ref id,
            ref name,
            ref data,
        } => commands::update::execute(&cli, id, name.as_deref(), data.as_deref()).await,
        Commands::Delete { ref id, force } => commands::delete::execute(&cli, id, force).await,
        Commands::Verify => commands::verify::execute(&cli).await,
        Commands::Backup => commands::backup::execute(&cli).await,
        Commands::Backups => commands::backups::execute(&cli).await,
        Commands::Restore { ref backup, force } => {
            commands::restore::execute(&cli, backup.as_deref(), force).await
        }
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr so stdout stays clean for `get`.
/// Quiet unless `RUST_LOG` says otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
