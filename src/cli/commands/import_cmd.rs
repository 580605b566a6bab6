//! `tiervault import` — replace the vault with an export document.

use std::fs;
use std::path::Path;

use crate::cli::{confirm, log_audit, open_vault, output, print_warnings, Cli};
use crate::errors::{Result, TierVaultError};

/// Execute the `import` command.
pub async fn execute(cli: &Cli, file_path: &str, force: bool) -> Result<()> {
    let source = Path::new(file_path);
    if !source.exists() {
        return Err(TierVaultError::CommandFailed(format!(
            "import file not found: {}",
            source.display()
        )));
    }
    let content = fs::read_to_string(source)?;

    if !confirm("Importing replaces every record in the vault. Continue?", force)? {
        output::info("Cancelled.");
        return Ok(());
    }

    let mut manager = open_vault(cli).await?;
    let report = manager.import(&content).await?;

    log_audit(
        cli,
        "import",
        None,
        Some(&format!(
            "{} records from {}",
            report.imported,
            source.display()
        )),
    );
    output::success(&format!(
        "Imported {} records from {}",
        report.imported,
        source.display()
    ));
    print_warnings(&report.warnings);

    Ok(())
}
