//! `tiervault delete` — remove a record from the vault.

use crate::cli::{confirm, log_audit, open_vault, output, print_warnings, Cli};
use crate::errors::Result;

/// Execute the `delete` command.
pub async fn execute(cli: &Cli, id: &str, force: bool) -> Result<()> {
    if !confirm(&format!("Delete record '{id}'?"), force)? {
        output::info("Cancelled.");
        return Ok(());
    }

    let mut manager = open_vault(cli).await?;
    let outcome = manager.delete(id).await?;

    log_audit(cli, "delete", Some(id), None);
    output::success(&format!("Deleted record '{id}'"));
    print_warnings(&outcome.warnings);

    Ok(())
}
