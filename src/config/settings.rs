use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::Argon2Params;
use crate::errors::{Result, TierVaultError};
use crate::store::RetryPolicy;
use crate::vault::classifier::{DEFAULT_PRIVATE_CATEGORIES, DEFAULT_SENSITIVE_KEYWORDS};
use crate::vault::{TierClassifier, VaultOptions};

/// Project-level configuration, loaded from `.tiervault.toml`.
///
/// Every field has a sensible default so TierVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding mirror files,
    /// store blobs and the audit database.
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Words in a title or notes that make a record `secret`.
    #[serde(default = "default_sensitive_keywords")]
    pub sensitive_keywords: Vec<String>,

    /// Categories that make a record `private`.
    #[serde(default = "default_private_categories")]
    pub private_categories: Vec<String>,

    /// Attempts per backing-store call (clamped to 1..=5).
    #[serde(default = "default_remote_max_attempts")]
    pub remote_max_attempts: u32,

    /// Fixed pause between attempts, in milliseconds.
    #[serde(default = "default_remote_retry_delay_ms")]
    pub remote_retry_delay_ms: u64,

    /// Add a welcome record to newly created vaults.
    #[serde(default)]
    pub seed_new_vaults: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_dir() -> String {
    ".tiervault".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_sensitive_keywords() -> Vec<String> {
    DEFAULT_SENSITIVE_KEYWORDS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_private_categories() -> Vec<String> {
    DEFAULT_PRIVATE_CATEGORIES
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_remote_max_attempts() -> u32 {
    3
}

fn default_remote_retry_delay_ms() -> u64 {
    100
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            sensitive_keywords: default_sensitive_keywords(),
            private_categories: default_private_categories(),
            remote_max_attempts: default_remote_max_attempts(),
            remote_retry_delay_ms: default_remote_retry_delay_ms(),
            seed_new_vaults: false,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".tiervault.toml";

    /// Load settings from `<project_dir>/.tiervault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            TierVaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Root directory for all vault state.
    ///
    /// Example: `project_dir/.tiervault`
    pub fn vault_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_dir)
    }

    /// Directory holding the per-account mirror files.
    pub fn mirror_dir(&self, project_dir: &Path) -> PathBuf {
        self.vault_root(project_dir).join("mirror")
    }

    /// Directory used by the filesystem backing store.
    pub fn blobs_dir(&self, project_dir: &Path) -> PathBuf {
        self.vault_root(project_dir).join("blobs")
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.remote_max_attempts,
            Duration::from_millis(self.remote_retry_delay_ms),
        )
    }

    pub fn classifier(&self) -> TierClassifier {
        TierClassifier::new(
            self.sensitive_keywords.iter().cloned(),
            self.private_categories.iter().cloned(),
        )
    }

    /// Everything a `VaultManager` needs from the config file.
    pub fn vault_options(&self) -> VaultOptions {
        VaultOptions {
            kdf: self.argon2_params(),
            classifier: self.classifier(),
            retry: self.retry_policy(),
            seed_new_vaults: self.seed_new_vaults,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
