//! The Lockbox engine: per-record AES-256-CBC envelopes keyed from a device
//! bound master secret, with the secret kept in a pluggable secure backend.

pub mod backend;
pub mod blob_store;
mod codec;
mod context;
pub mod crypto;
pub mod fs;
pub mod identity;
pub mod keys;
pub mod object_store;
pub mod registry;
pub mod retry;
pub mod sealed;
pub mod storage;
#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{FnBackend, InternalBackend, KeyringBackend, ScopedBackend};
pub use blob_store::BlobStore;
pub use fs::LocalFileSystem;
pub use identity::DeviceIdentity;
pub use object_store::ObjectStore;
pub use registry::{DomainLease, DomainRegistry};
pub use retry::RetryPolicy;
pub use storage::{BackendCapability, Storage, StorageBuilder};
