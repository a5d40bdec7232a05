use thiserror::Error;

/// Result alias used across the Lockbox crates.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by the encrypted object store and its collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Another live `Storage` in the same registry already owns this domain.
    #[error("storage already open for domain {domain}")]
    DomainInUse { domain: String },
    /// Record key is empty or contains a forbidden character.
    #[error("invalid character in record key {key:?}")]
    InvalidKey { key: String },
    /// Sanitized type folder name exceeds the file name limit.
    #[error("type folder name too long ({len} chars): {name}")]
    TypeNameTooLong { name: String, len: usize },
    /// The secret slot holds something that is not a hex encoded 32-byte secret.
    #[error("invalid master secret: {reason}")]
    InvalidMasterSecret { reason: String },
    /// Secure key/value backend failure.
    #[error("secure backend failure: {reason}")]
    Backend { reason: String },
    /// Every attempt of a retried operation failed.
    #[error("{operation} gave up after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        last_error: String,
    },
    /// The record was written under a different master secret (or is corrupt).
    #[error("record {key} cannot be decrypted with the current master secret")]
    StaleRecord { key: String, purged: bool },
    /// Encoding a value failed.
    #[error("serialization failure: {reason}")]
    Serialization { reason: String },
    /// Underlying storage failure (I/O, poisoned lock).
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl StorageError {
    pub fn backend<E: ToString>(err: E) -> Self {
        Self::Backend {
            reason: err.to_string(),
        }
    }

    pub fn storage<E: ToString>(err: E) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }

    /// Configuration errors are raised to the caller immediately and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DomainInUse { .. }
                | Self::InvalidKey { .. }
                | Self::TypeNameTooLong { .. }
                | Self::InvalidMasterSecret { .. }
        )
    }
}
