//! `tiervault get` — decrypt and show a single record.
//!
//! Secret records are opened with an access proof minted for this call
//! only; the proof is dropped (and its private inputs zeroed) on return.

use crate::cli::{log_audit, open_vault, output, Cli};
use crate::errors::{Result, TierVaultError};
use crate::vault::Tier;

/// Execute the `get` command.
pub async fn execute(cli: &Cli, id: &str, value_only: bool) -> Result<()> {
    let manager = open_vault(cli).await?;

    let tier = manager
        .list()?
        .into_iter()
        .find(|r| r.id == id)
        .map(|r| r.privacy_tier)
        .ok_or_else(|| TierVaultError::NotFound(format!("record '{id}'")))?;

    let proof = if tier == Tier::Secret {
        Some(manager.issue_proof(id)?)
    } else {
        None
    };
    let record = manager.get(id, proof.as_ref())?;

    log_audit(cli, "get", Some(id), Some(&format!("tier={tier}")));

    if value_only {
        println!("{}", record.secret_value);
    } else {
        output::print_record(&record);
    }

    Ok(())
}
