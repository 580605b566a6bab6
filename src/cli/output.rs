//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::strength::{Strength, StrengthReport};
use crate::vault::{Record, RecordSummary, Tier};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// A tier name, colored by how sensitive it is.
pub fn tier_label(tier: Tier) -> String {
    match tier {
        Tier::Public => style(tier).dim().to_string(),
        Tier::Private => style(tier).cyan().to_string(),
        Tier::Secret => style(tier).magenta().bold().to_string(),
    }
}

/// Print a table of record metadata (Id, Title, Category, Tier, Updated).
pub fn print_records_table(records: &[RecordSummary]) {
    if records.is_empty() {
        info("No records in this vault yet.");
        tip("Run `tiervault add <TITLE>` to add your first record.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Title", "Category", "Tier", "Updated"]);

    for r in records {
        table.add_row(vec![
            r.id.clone(),
            r.title.clone(),
            r.category.clone(),
            tier_label(r.privacy_tier),
            r.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}

/// Print one decrypted record as a two-column table.
pub fn print_record(record: &Record) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let rows = [
        ("Id", record.id.clone()),
        ("Title", record.title.clone()),
        ("Username", record.username.clone()),
        ("Secret", record.secret_value.clone()),
        ("URL", record.url.clone()),
        ("Notes", record.notes.clone()),
        ("Category", record.category.clone()),
        ("Tier", tier_label(record.privacy_tier)),
        (
            "Created",
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        (
            "Updated",
            record.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
    ];
    for (name, value) in rows {
        table.add_row(vec![style(name).bold().to_string(), value]);
    }

    println!("{table}");
}

pub fn print_strength(report: &StrengthReport) {
    let label = match report.strength {
        Strength::Weak => style(report.strength).red().bold(),
        Strength::Medium => style(report.strength).yellow().bold(),
        Strength::Strong => style(report.strength).green(),
        Strength::VeryStrong => style(report.strength).green().bold(),
    };
    println!(
        "{} ({}/{})",
        label,
        report.score,
        crate::strength::MAX_SCORE
    );
    for hint in &report.feedback {
        tip(hint);
    }
}
