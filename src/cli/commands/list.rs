//! `tiervault list` — display all records in a table.

use crate::cli::{open_vault, output, Cli};
use crate::errors::Result;
use crate::vault::Tier;

/// Execute the `list` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let manager = open_vault(cli).await?;
    let records = manager.list()?;

    let count = |tier: Tier| records.iter().filter(|r| r.privacy_tier == tier).count();
    output::info(&format!(
        "{} record(s): {} public, {} private, {} secret",
        records.len(),
        count(Tier::Public),
        count(Tier::Private),
        count(Tier::Secret),
    ));

    output::print_records_table(&records);

    let unsynced = records
        .iter()
        .filter(|r| r.privacy_tier.requires_remote())
        .count()
        .saturating_sub(manager.remote_references()?.len());
    if unsynced > 0 {
        output::tip(&format!(
            "{unsynced} secret record(s) are not in the backing store yet; run `tiervault sync`."
        ));
    }

    Ok(())
}
