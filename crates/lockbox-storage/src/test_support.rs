use std::{
    io,
    path::Path,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use lockbox_core::{FileSystem, InMemorySecureKeyValue, SecureKeyValue};
use serde::{Deserialize, Serialize};

use crate::{
    fs::LocalFileSystem,
    identity::DeviceIdentity,
    keys::{domain_id, master_secret_slot},
    registry::DomainRegistry,
    retry::RetryPolicy,
    storage::StorageBuilder,
    Storage,
};

pub(crate) const DOMAIN: &str = "com.example.tests";

pub(crate) fn identity() -> DeviceIdentity {
    DeviceIdentity::new("test-host", "tester")
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(10, Duration::from_millis(1))
}

/// Builder preset for tests: fixed identity, in-memory secure backend.
pub(crate) fn builder(root: &Path, backend: &InMemorySecureKeyValue) -> StorageBuilder {
    Storage::builder(DOMAIN, root)
        .backend(Arc::new(backend.clone()))
        .identity(identity())
        .retry(fast_retry())
}

pub(crate) fn open(root: &Path, backend: &InMemorySecureKeyValue) -> Storage {
    builder(root, backend)
        .open(&DomainRegistry::new())
        .expect("open storage")
}

/// Secure backend already holding `secret` as the master secret of [`DOMAIN`].
pub(crate) fn backend_with_secret(secret: [u8; 32]) -> InMemorySecureKeyValue {
    let backend = InMemorySecureKeyValue::new();
    let slot = format!("{}.{}", domain_id(DOMAIN), master_secret_slot(&identity()));
    backend
        .set(&slot, Some(&hex::encode(secret)))
        .expect("seed master secret");
    backend
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Settings {
    pub theme: String,
    pub retries: u32,
}

impl lockbox_core::Record for Settings {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Contact {
    pub id: String,
    pub name: String,
}

impl lockbox_core::Record for Contact {
    fn record_key(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

/// Local file system that fails a configurable number of reads or writes
/// first, the way a file held open by another handle does, and counts calls.
#[derive(Default)]
pub(crate) struct FlakyFileSystem {
    inner: LocalFileSystem,
    failing_writes: AtomicU32,
    failing_reads: AtomicU32,
    calls: AtomicU32,
}

impl FlakyFileSystem {
    pub(crate) fn failing_writes(count: u32) -> Arc<Self> {
        let fs = Self::default();
        fs.failing_writes.store(count, Ordering::SeqCst);
        Arc::new(fs)
    }

    pub(crate) fn failing_reads(count: u32) -> Arc<Self> {
        let fs = Self::default();
        fs.failing_reads.store(count, Ordering::SeqCst);
        Arc::new(fs)
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn trip(&self, counter: &AtomicU32) -> io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(io::Error::other("file is in use by another handle"));
        }
        Ok(())
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl FileSystem for FlakyFileSystem {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        self.trip(&self.failing_reads)?;
        self.inner.read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.trip(&self.failing_writes)?;
        self.inner.write(path, bytes)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.count();
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.count();
        self.inner.create_dir_all(path)
    }

    fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<String>> {
        self.count();
        self.inner.list_files(dir, extension)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.count();
        self.inner.remove_dir_all(path)
    }
}
