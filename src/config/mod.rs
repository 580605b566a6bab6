//! Project configuration (`.tiervault.toml`).

pub mod settings;

pub use settings::Settings;
