//! `tiervault completions` — print a shell completion script.
//!
//!   tiervault completions bash > ~/.bash_completion.d/tiervault

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::{Result, TierVaultError};

/// Accepted names, lowercase.
const SHELLS: &[(&str, Shell)] = &[
    ("bash", Shell::Bash),
    ("zsh", Shell::Zsh),
    ("fish", Shell::Fish),
    ("powershell", Shell::PowerShell),
    ("pwsh", Shell::PowerShell),
    ("ps", Shell::PowerShell),
    ("elvish", Shell::Elvish),
];

pub fn execute(shell: &str) -> Result<()> {
    write_script(parse_shell(shell)?, &mut io::stdout())
}

fn write_script(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tiervault", out);
    Ok(())
}

fn parse_shell(name: &str) -> Result<Shell> {
    let wanted = name.trim().to_ascii_lowercase();
    SHELLS
        .iter()
        .find(|(n, _)| *n == wanted)
        .map(|(_, shell)| *shell)
        .ok_or_else(|| {
            TierVaultError::CommandFailed(format!(
                "unknown shell '{name}' (supported: bash, zsh, fish, powershell, elvish)"
            ))
        })
}
