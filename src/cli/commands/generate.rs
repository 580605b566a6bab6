//! `tiervault generate` — print a random secret value.

use crate::cli::output;
use crate::errors::Result;
use crate::strength::{check_strength, generate_secure_value};

/// Execute the `generate` command.
pub fn execute(length: usize, no_special: bool) -> Result<()> {
    let value = zeroize::Zeroizing::new(generate_secure_value(length, !no_special)?);
    println!("{}", value.as_str());
    output::print_strength(&check_strength(&value));
    Ok(())
}
