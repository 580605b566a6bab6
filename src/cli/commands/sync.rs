//! `tiervault sync` — push secret records the backing store is missing.

use crate::cli::{log_audit, open_vault, output, print_warnings, Cli};
use crate::errors::Result;

/// Execute the `sync` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let mut manager = open_vault(cli).await?;
    let report = manager.backfill_remote().await?;

    log_audit(
        cli,
        "sync",
        None,
        Some(&format!("{} pushed", report.pushed)),
    );
    if report.warnings.is_empty() {
        output::success(&format!(
            "Backing store up to date ({} record(s) pushed)",
            report.pushed
        ));
    } else {
        print_warnings(&report.warnings);
    }

    Ok(())
}
