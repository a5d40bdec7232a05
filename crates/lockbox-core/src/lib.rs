//! Core contracts for Lockbox: errors, record typing and key rules, and the
//! two collaborator seams (secure key/value backend and raw file system).
//! This crate is intentionally small to keep dependency surface minimal.

pub mod backend;
pub mod error;
pub mod fs;
pub mod record;

pub use backend::{InMemorySecureKeyValue, SecureKeyValue};
pub use error::{StorageError, StorageResult};
pub use fs::FileSystem;
pub use record::{Record, DEFAULT_KEY};
