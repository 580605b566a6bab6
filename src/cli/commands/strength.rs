//! `tiervault strength` — score a candidate secret value.

use crate::cli::output;
use crate::errors::{Result, TierVaultError};
use crate::strength::check_strength;

/// Execute the `strength` command.
pub fn execute(value: Option<&str>) -> Result<()> {
    let value = match value {
        Some(v) => zeroize::Zeroizing::new(v.to_string()),
        None => zeroize::Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt("Value to check")
                .interact()
                .map_err(|e| TierVaultError::CommandFailed(format!("input prompt: {e}")))?,
        ),
    };

    output::print_strength(&check_strength(&value));
    Ok(())
}
