use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use lockbox_core::{FileSystem, StorageError, StorageResult};

use crate::{
    crypto,
    keys::{derive_record_key, MasterSecret},
    retry::RetryPolicy,
};

/// State shared by the store handles of one `Storage`.
pub(crate) struct StoreContext {
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) domain_root: PathBuf,
    pub(crate) secret: MasterSecret,
    pub(crate) encrypted: bool,
    pub(crate) retry: RetryPolicy,
    pub(crate) purge_stale_records: bool,
    root_lock: Mutex<()>,
}

impl StoreContext {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        domain_root: PathBuf,
        secret: MasterSecret,
        encrypted: bool,
        retry: RetryPolicy,
        purge_stale_records: bool,
    ) -> Self {
        Self {
            fs,
            domain_root,
            secret,
            encrypted,
            retry,
            purge_stale_records,
            root_lock: Mutex::new(()),
        }
    }

    /// Coarse lock over the domain root; every mutation holds it.
    pub(crate) fn lock(&self) -> StorageResult<MutexGuard<'_, ()>> {
        self.root_lock
            .lock()
            .map_err(|err| StorageError::storage(format!("lock poisoned: {err}")))
    }

    /// Envelope for the record `key`, or the bytes unchanged when encryption is off.
    pub(crate) fn seal(&self, key: &str, plaintext: Vec<u8>) -> Vec<u8> {
        if !self.encrypted {
            return plaintext;
        }
        crypto::encrypt(&plaintext, &derive_record_key(&self.secret, key))
    }

    /// Inverse of [`StoreContext::seal`]; `None` when the envelope does not open.
    pub(crate) fn unseal(&self, key: &str, stored: Vec<u8>) -> Option<Vec<u8>> {
        if !self.encrypted {
            return Some(stored);
        }
        crypto::decrypt(&stored, &derive_record_key(&self.secret, key))
    }
}
