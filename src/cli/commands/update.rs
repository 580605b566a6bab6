//! `tiervault update` — change fields of an existing record.
//!
//! Omitted fields keep their current value.  The record is
//! re-classified, so an update can move it between tiers.

use crate::cli::{log_audit, open_vault, output, print_warnings, Cli};
use crate::errors::{Result, TierVaultError};
use crate::vault::Tier;

/// Replacement values; `None` keeps the current value.
#[derive(Default)]
pub struct UpdateArgs<'a> {
    pub title: Option<&'a str>,
    pub username: Option<&'a str>,
    pub value: Option<&'a str>,
    pub url: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub category: Option<&'a str>,
}

impl UpdateArgs<'_> {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.username.is_none()
            && self.value.is_none()
            && self.url.is_none()
            && self.notes.is_none()
            && self.category.is_none()
    }
}

/// Execute the `update` command.
pub async fn execute(cli: &Cli, id: &str, args: UpdateArgs<'_>) -> Result<()> {
    if args.is_empty() {
        return Err(TierVaultError::CommandFailed(
            "nothing to update — pass at least one field".into(),
        ));
    }

    let mut manager = open_vault(cli).await?;

    let summary = manager
        .list()?
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| TierVaultError::NotFound(format!("record '{id}'")))?;
    let proof = if summary.privacy_tier == Tier::Secret {
        Some(manager.issue_proof(id)?)
    } else {
        None
    };
    let current = manager.get(id, proof.as_ref())?;

    let mut draft = current.to_draft();
    let set = |field: &mut String, value: Option<&str>| {
        if let Some(v) = value {
            *field = v.to_string();
        }
    };
    set(&mut draft.title, args.title);
    set(&mut draft.username, args.username);
    set(&mut draft.secret_value, args.value);
    set(&mut draft.url, args.url);
    set(&mut draft.notes, args.notes);
    set(&mut draft.category, args.category);

    let outcome = manager.update(id, draft).await?;
    let tier = manager
        .list()?
        .into_iter()
        .find(|r| r.id == id)
        .map(|r| r.privacy_tier)
        .unwrap_or(current.privacy_tier);

    log_audit(cli, "update", Some(id), Some(&format!("tier={tier}")));
    if tier == current.privacy_tier {
        output::success(&format!("Updated '{id}'"));
    } else {
        output::success(&format!(
            "Updated '{id}' (tier {} -> {})",
            output::tier_label(current.privacy_tier),
            output::tier_label(tier)
        ));
    }
    print_warnings(&outcome.warnings);

    Ok(())
}
