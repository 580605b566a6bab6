//! `tiervault add` — classify, encrypt and store a new record.

use std::io::{self, IsTerminal, Read};

use crate::cli::{log_audit, open_vault, output, print_warnings, Cli};
use crate::errors::{Result, TierVaultError};
use crate::strength::generate_secure_value;
use crate::vault::RecordDraft;

/// Length of values produced by `add --generate`.
const GENERATED_LEN: usize = 24;

/// Fields of the `add` subcommand.
pub struct AddArgs<'a> {
    pub title: &'a str,
    pub username: &'a str,
    pub value: Option<&'a str>,
    pub generate: bool,
    pub url: &'a str,
    pub notes: &'a str,
    pub category: &'a str,
    pub id: Option<&'a str>,
}

/// Execute the `add` command.
pub async fn execute(cli: &Cli, args: AddArgs<'_>) -> Result<()> {
    let secret_value = read_secret_value(args.title, args.value, args.generate)?;

    let mut manager = open_vault(cli).await?;
    let outcome = manager
        .add(RecordDraft {
            id: args.id.map(str::to_string),
            title: args.title.to_string(),
            username: args.username.to_string(),
            secret_value: secret_value.to_string(),
            url: args.url.to_string(),
            notes: args.notes.to_string(),
            category: args.category.to_string(),
        })
        .await?;

    let record = manager
        .list()?
        .into_iter()
        .find(|r| r.id == outcome.record_id)
        .ok_or_else(|| TierVaultError::NotFound(outcome.record_id.clone()))?;

    log_audit(
        cli,
        "add",
        Some(&record.id),
        Some(&format!("tier={}", record.privacy_tier)),
    );
    output::success(&format!(
        "Added '{}' as {} ({})",
        record.title,
        output::tier_label(record.privacy_tier),
        record.id
    ));
    if args.generate {
        output::tip("A random value was generated; view it with `tiervault get <ID>`.");
    }
    print_warnings(&outcome.warnings);

    Ok(())
}

/// Determine the secret value from one of four sources.
pub(crate) fn read_secret_value(
    title: &str,
    value: Option<&str>,
    generate: bool,
) -> Result<zeroize::Zeroizing<String>> {
    let value = if generate {
        generate_secure_value(GENERATED_LEN, true)?
    } else if let Some(v) = value {
        output::warning("Value provided on command line — it may appear in shell history.");
        v.to_string()
    } else if !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf.trim_end().to_string()
    } else {
        dialoguer::Password::new()
            .with_prompt(format!("Secret value for '{title}'"))
            .allow_empty_password(true)
            .interact()
            .map_err(|e| TierVaultError::CommandFailed(format!("input prompt: {e}")))?
    };
    Ok(zeroize::Zeroizing::new(value))
}
