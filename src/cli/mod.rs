//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use dialoguer::Confirm;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{Result, TierVaultError};
use crate::store::{ContentStore, DirectoryStore, UnavailableStore};
use crate::vault::{FileMirror, VaultManager, VaultWarning};

/// Environment variable holding the master secret (CI / scripting).
pub const MASTER_SECRET_ENV: &str = "TIERVAULT_MASTER_SECRET";

/// TierVault CLI: privacy-tiered credential vault.
#[derive(Parser)]
#[command(
    name = "tiervault",
    about = "Privacy-tiered credential vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Account identity that owns the vault (wallet address, email, ...)
    #[arg(short, long, env = "TIERVAULT_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Vault directory (overrides `vault_dir` from .tiervault.toml)
    #[arg(long, global = true)]
    pub vault_dir: Option<String>,

    /// Keep everything local; do not touch the backing store
    #[arg(long, global = true)]
    pub offline: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Add a record (its tier is chosen from title, notes and category)
    Add {
        /// Record title
        title: String,
        #[arg(short, long, default_value = "")]
        username: String,
        /// Secret value (omit for interactive prompt)
        #[arg(long)]
        value: Option<String>,
        /// Generate a random secret value instead of prompting
        #[arg(short, long, conflicts_with = "value")]
        generate: bool,
        #[arg(long, default_value = "")]
        url: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(short, long, default_value = "")]
        category: String,
        /// Use this record id instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },

    /// Update a record; omitted fields keep their current value
    Update {
        /// Record id
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        username: Option<String>,
        #[arg(long)]
        value: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show a record (secret records are opened with a fresh access proof)
    Get {
        /// Record id
        id: String,
        /// Print only the secret value
        #[arg(long)]
        value_only: bool,
    },

    /// List records (metadata only)
    List,

    /// Delete a record
    Delete {
        /// Record id
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Export the vault as JSON (sensitive fields stay encrypted)
    Export {
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replace the vault with the content of an export file
    Import {
        /// Path to the export file
        file: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Destroy the local vault (and with --all, the remote blobs too)
    Reset {
        /// Also delete every blob of the account from the backing store
        #[arg(long)]
        all: bool,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Push secret records that are missing from the backing store
    Sync,

    /// Generate a random secret value
    Generate {
        #[arg(short, long, default_value = "20")]
        length: usize,
        /// Letters and digits only
        #[arg(long)]
        no_special: bool,
    },

    /// Score the strength of a value
    Strength {
        /// Value to check (omit for interactive prompt)
        value: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },

    /// View the audit log of vault operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Settings from `.tiervault.toml` in the current directory, with CLI
/// overrides applied.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    let mut settings = Settings::load(&cwd)?;
    if let Some(dir) = &cli.vault_dir {
        settings.vault_dir = dir.clone();
    }
    Ok(settings)
}

/// Root directory of all vault state for this invocation.
pub fn vault_root(cli: &Cli) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(load_settings(cli)?.vault_root(&cwd))
}

/// The account identity from `--account` / `TIERVAULT_ACCOUNT`.
pub fn require_account(cli: &Cli) -> Result<String> {
    match cli.account.as_deref().map(str::trim) {
        Some(account) if !account.is_empty() => Ok(account.to_string()),
        _ => Err(TierVaultError::CommandFailed(
            "no account given — pass --account or set TIERVAULT_ACCOUNT".into(),
        )),
    }
}

/// Build a manager over the file mirror and the directory store
/// (or no store at all with `--offline`).
pub fn build_manager(cli: &Cli, settings: &Settings) -> Result<VaultManager> {
    let cwd = std::env::current_dir()?;
    let mirror = FileMirror::new(settings.mirror_dir(&cwd));
    let store: Box<dyn ContentStore> = if cli.offline {
        Box::new(UnavailableStore)
    } else {
        Box::new(DirectoryStore::new(settings.blobs_dir(&cwd)))
    };
    Ok(VaultManager::new(
        Box::new(mirror),
        store,
        settings.vault_options(),
    ))
}

/// Prompt for the master secret, unlock, and report any warnings.
pub async fn open_vault(cli: &Cli) -> Result<VaultManager> {
    let settings = load_settings(cli)?;
    let account = require_account(cli)?;
    let mut manager = build_manager(cli, &settings)?;

    let master = prompt_master_secret()?;
    let report = manager.unlock(&account, &master).await?;
    if report.created {
        output::info(&format!("Created a new vault for {account}"));
    }
    if report.restored > 0 {
        output::info(&format!(
            "Restored {} record(s) from the backing store",
            report.restored
        ));
    }
    print_warnings(&report.warnings);
    Ok(manager)
}

/// Get the master secret, trying in order:
/// 1. `TIERVAULT_MASTER_SECRET` env var (CI/CD)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the secret is wiped from memory on drop.
pub fn prompt_master_secret() -> Result<Zeroizing<String>> {
    if let Ok(secret) = std::env::var(MASTER_SECRET_ENV) {
        if !secret.is_empty() {
            return Ok(Zeroizing::new(secret));
        }
    }

    let secret = dialoguer::Password::new()
        .with_prompt("Enter master secret")
        .interact()
        .map_err(|e| TierVaultError::CommandFailed(format!("master secret prompt: {e}")))?;
    Ok(Zeroizing::new(secret))
}

/// Ask a yes/no question, defaulting to no.  `force` skips the prompt.
pub fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| TierVaultError::CommandFailed(format!("confirm prompt: {e}")))
}

pub fn print_warnings(warnings: &[VaultWarning]) {
    for w in warnings {
        output::warning(&w.to_string());
    }
    if !warnings.is_empty() {
        output::tip("Run `tiervault sync` once the backing store is reachable.");
    }
}

/// Log an audit event under the vault root.  Never fails the caller.
pub fn log_audit(cli: &Cli, op: &str, record_id: Option<&str>, details: Option<&str>) {
    #[cfg(feature = "audit-log")]
    {
        let (Ok(root), Some(account)) = (vault_root(cli), cli.account.as_deref()) else {
            return;
        };
        if let Some(audit) = crate::audit::AuditLog::open(&root) {
            audit.log(op, account, record_id, details);
        }
    }

    #[cfg(not(feature = "audit-log"))]
    let _ = (cli, op, record_id, details);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_parses_fields() {
        let cli = Cli::try_parse_from([
            "tiervault",
            "--account",
            "0xabc",
            "add",
            "Bank login",
            "--category",
            "Banking",
            "--value",
            "pw",
        ])
        .unwrap();
        assert_eq!(cli.account.as_deref(), Some("0xabc"));
        match cli.command {
            Commands::Add {
                title,
                category,
                value,
                ..
            } => {
                assert_eq!(title, "Bank login");
                assert_eq!(category, "Banking");
                assert_eq!(value.as_deref(), Some("pw"));
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn value_and_generate_conflict() {
        let result = Cli::try_parse_from([
            "tiervault", "add", "Mail", "--value", "x", "--generate",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn blank_account_is_rejected() {
        let cli = Cli::try_parse_from(["tiervault", "--account", "  ", "list"]).unwrap();
        assert!(require_account(&cli).is_err());
    }
}
