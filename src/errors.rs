use thiserror::Error;

/// All errors that can occur in TierVault.
#[derive(Debug, Error)]
pub enum TierVaultError {
    // --- Session / access errors ---
    #[error("Authentication failed — wrong master secret for this account")]
    Authentication,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — payload is corrupt, tampered, or not authorized")]
    Decryption,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Record / storage errors ---
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Audit error: {0}")]
    Audit(String),
}

/// Coarse error classification, matching the engine's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    AccessDenied,
    Decryption,
    NotFound,
    RemoteUnavailable,
    Format,
    Precondition,
    Other,
}

impl TierVaultError {
    /// Classify this error without matching on its message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication => ErrorKind::Authentication,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::Decryption => ErrorKind::Decryption,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Self::Format(_) => ErrorKind::Format,
            Self::Precondition(_) => ErrorKind::Precondition,
            _ => ErrorKind::Other,
        }
    }
}

/// Convenience type alias for TierVault results.
pub type Result<T> = std::result::Result<T, TierVaultError>;
