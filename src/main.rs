use clap::Parser;
use tracing_subscriber::EnvFilter;

use tiervault::cli::commands::{add::AddArgs, update::UpdateArgs};
use tiervault::cli::{commands, output, Cli, Commands};
use tiervault::errors::{Result, TierVaultError};

/// Environment variable holding the tracing filter (e.g. `tiervault=debug`).
const LOG_ENV: &str = "TIERVAULT_LOG";

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TierVaultError::CommandFailed(format!("failed to start runtime: {e}")))
        .and_then(|rt| rt.block_on(run(&cli)));

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match cli.command {
        Commands::Add {
            ref title,
            ref username,
            ref value,
            generate,
            ref url,
            ref notes,
            ref category,
            ref id,
        } => {
            let args = AddArgs {
                title,
                username,
                value: value.as_deref(),
                generate,
                url,
                notes,
                category,
                id: id.as_deref(),
            };
            commands::add::execute(cli, args).await
        }
        Commands::Update {
            ref id,
            ref title,
            ref username,
            ref value,
            ref url,
            ref notes,
            ref category,
        } => {
            let args = UpdateArgs {
                title: title.as_deref(),
                username: username.as_deref(),
                value: value.as_deref(),
                url: url.as_deref(),
                notes: notes.as_deref(),
                category: category.as_deref(),
            };
            commands::update::execute(cli, id, args).await
        }
        Commands::Get { ref id, value_only } => commands::get::execute(cli, id, value_only).await,
        Commands::List => commands::list::execute(cli).await,
        Commands::Delete { ref id, force } => commands::delete::execute(cli, id, force).await,
        Commands::Export { ref output } => commands::export::execute(cli, output.as_deref()).await,
        Commands::Import { ref file, force } => {
            commands::import_cmd::execute(cli, file, force).await
        }
        Commands::Reset { all, force } => commands::reset::execute(cli, all, force).await,
        Commands::Sync => commands::sync::execute(cli).await,
        Commands::Generate { length, no_special } => commands::generate::execute(length, no_special),
        Commands::Strength { ref value } => commands::strength::execute(value.as_deref()),
        Commands::Completions { ref shell } => commands::completions::execute(shell),
        #[cfg(feature = "audit-log")]
        Commands::Audit { last, ref since } => {
            commands::audit_cmd::execute(cli, last, since.as_deref())
        }
        #[cfg(not(feature = "audit-log"))]
        Commands::Audit { .. } => Err(TierVaultError::CommandFailed(
            "this build has no audit log (enable the `audit-log` feature)".into(),
        )),
    }
}
