//! One module per subcommand.

pub mod add;
#[cfg(feature = "audit-log")]
pub mod audit_cmd;
pub mod completions;
pub mod delete;
pub mod export;
pub mod generate;
pub mod get;
pub mod import_cmd;
pub mod list;
pub mod reset;
pub mod strength;
pub mod sync;
pub mod update;
