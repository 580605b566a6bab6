//! `tiervault reset` — destroy vault state for an account.
//!
//! - `tiervault reset`        clears the local mirror (needs the master secret)
//! - `tiervault reset --all`  also deletes every remote blob of the account;
//!   works without the master secret so a forgotten one can be recovered from

use crate::cli::{
    build_manager, confirm, load_settings, log_audit, open_vault, output, print_warnings,
    require_account, Cli,
};
use crate::errors::Result;

/// Execute the `reset` command.
pub async fn execute(cli: &Cli, all: bool, force: bool) -> Result<()> {
    let account = require_account(cli)?;
    let prompt = if all {
        format!("Permanently delete ALL vault data for {account}, including remote copies?")
    } else {
        format!("Delete the local vault for {account}?")
    };
    let confirmed = confirm(&prompt, force)?;
    if !confirmed {
        output::info("Cancelled.");
        return Ok(());
    }

    if all {
        let settings = load_settings(cli)?;
        let mut manager = build_manager(cli, &settings)?;
        manager.set_account_identity(&account)?;
        let report = manager.force_reset(confirmed).await?;

        log_audit(
            cli,
            "reset",
            None,
            Some(&format!("all, {} remote blobs", report.remote_deleted)),
        );
        output::success(&format!(
            "Destroyed the vault for {account} ({} remote blob(s) deleted)",
            report.remote_deleted
        ));
        print_warnings(&report.warnings);
    } else {
        let mut manager = open_vault(cli).await?;
        manager.reset(confirmed)?;

        log_audit(cli, "reset", None, Some("local"));
        output::success(&format!("Cleared the local vault for {account}"));
        output::tip("Remote copies of secret records are kept; unlock again to restore them.");
    }

    Ok(())
}
