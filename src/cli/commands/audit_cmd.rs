//! `tiervault audit` — display the audit log.
//!
//! Usage:
//!   tiervault audit               # show last 50 entries
//!   tiervault audit --last 20     # show last 20
//!   tiervault audit --since 7d    # entries from last 7 days

use chrono::{DateTime, Duration, Utc};

use crate::audit::{AuditEntry, AuditLog};
use crate::cli::{output, vault_root, Cli};
use crate::errors::{Result, TierVaultError};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let root = vault_root(cli)?;

    let audit = AuditLog::open(&root)
        .ok_or_else(|| TierVaultError::Audit("failed to open audit database".into()))?;

    let since_dt = since.map(parse_duration).transpose()?;

    let mut entries = audit.query(last, since_dt)?;
    if let Some(account) = cli.account.as_deref() {
        entries.retain(|e| e.account == account);
    }

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);

    Ok(())
}

/// Parse a human-friendly duration string like "7d", "24h", "30m" into
/// the instant that long ago.
fn parse_duration(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    let invalid = |reason: &str| {
        TierVaultError::CommandFailed(format!("invalid duration '{input}': {reason}"))
    };

    let (num_str, unit): (&str, fn(i64) -> Duration) = if let Some(s) = input.strip_suffix('d') {
        (s, Duration::days)
    } else if let Some(s) = input.strip_suffix('h') {
        (s, Duration::hours)
    } else if let Some(s) = input.strip_suffix('m') {
        (s, Duration::minutes)
    } else {
        return Err(invalid("use a format like 7d, 24h, or 30m"));
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| invalid("number part is not valid"))?;

    Ok(Utc::now() - unit(num))
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Operation", "Account", "Record", "Details"]);

    for entry in entries {
        let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let op = colorize_operation(&entry.operation);
        let record = entry.record_id.as_deref().unwrap_or("-");
        let details = entry.details.as_deref().unwrap_or("-");

        table.add_row(vec![
            time,
            op,
            entry.account.clone(),
            record.to_string(),
            details.to_string(),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

/// Colorize operation names for display.
fn colorize_operation(op: &str) -> String {
    use console::style;

    match op {
        "add" => style(op).green().to_string(),
        "update" => style(op).blue().to_string(),
        "delete" | "reset" => style(op).red().to_string(),
        "get" => style(op).magenta().to_string(),
        "export" | "import" => style(op).cyan().to_string(),
        "sync" => style(op).yellow().to_string(),
        _ => op.to_string(),
    }
}
