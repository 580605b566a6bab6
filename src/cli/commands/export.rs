//! `tiervault export` — write the vault as an export document.
//!
//! Sensitive fields of private and secret records stay encrypted in the
//! output; importing it again needs the same master secret.

use std::fs;
use std::path::Path;

use crate::cli::{log_audit, open_vault, output, Cli};
use crate::errors::{Result, TierVaultError};

/// Execute the `export` command.
pub async fn execute(cli: &Cli, output_path: Option<&str>) -> Result<()> {
    let manager = open_vault(cli).await?;
    let content = manager.export()?;
    let count = manager.record_count()?;

    log_audit(cli, "export", None, Some(&format!("{count} records")));

    match output_path {
        Some(dest) => {
            let dest_path = Path::new(dest);

            // Refuse to overwrite mirror files.
            if dest.ends_with(".vault.json") {
                return Err(TierVaultError::CommandFailed(
                    "refusing to export over a vault mirror file".into(),
                ));
            }

            fs::write(dest_path, &content).map_err(|e| {
                TierVaultError::CommandFailed(format!("failed to write export file: {e}"))
            })?;

            output::success(&format!("Exported {count} records to {dest}"));
        }
        None => {
            // Raw output only, so it can be redirected.
            println!("{content}");
        }
    }

    Ok(())
}
