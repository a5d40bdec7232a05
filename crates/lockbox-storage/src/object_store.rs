//! Typed records stored as one file per key under a folder per type:
//! `<domain root>/<type folder>/<key>.<cry|json>`.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use lockbox_core::{
    record::{type_folder, validate_key},
    Record, StorageError, StorageResult, DEFAULT_KEY,
};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn, Span};

use crate::{codec, context::StoreContext, retry::Attempt};

const ENCRYPTED_EXT: &str = "cry";
const PLAIN_EXT: &str = "json";

/// Handle to the object records of one domain. Cheap to clone.
#[derive(Clone)]
pub struct ObjectStore {
    ctx: Arc<StoreContext>,
}

impl ObjectStore {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    /// File extension of records in this store.
    pub fn extension(&self) -> &'static str {
        if self.ctx.encrypted {
            ENCRYPTED_EXT
        } else {
            PLAIN_EXT
        }
    }

    /// Folder holding the records of type `T`.
    pub fn folder_for<T: Record>(&self) -> StorageResult<PathBuf> {
        Ok(self
            .ctx
            .domain_root
            .join(type_folder(&T::type_identifier())?))
    }

    /// File backing the record `key` of type `T`.
    pub fn path_for<T: Record>(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.file_in(&self.folder_for::<T>()?, key))
    }

    fn file_in(&self, folder: &Path, key: &str) -> PathBuf {
        folder.join(format!("{key}.{}", self.extension()))
    }

    /// Save `value` and return the key used: `key`, else the record's own
    /// key, else [`DEFAULT_KEY`].
    #[instrument(skip_all, fields(key))]
    pub fn save<T: Record>(&self, value: &T, key: Option<&str>) -> StorageResult<String> {
        let key = key
            .map(str::to_string)
            .or_else(|| value.record_key())
            .unwrap_or_else(|| DEFAULT_KEY.to_string());
        Span::current().record("key", key.as_str());

        let path = self.path_for::<T>(&key)?;
        let folder = self.folder_for::<T>()?;
        let plaintext = codec::encode(value)?;
        let bytes = self.ctx.seal(&key, plaintext);

        let _guard = self.ctx.lock()?;
        self.ctx.retry.run("save", || {
            self.ctx
                .fs
                .create_dir_all(&folder)
                .and_then(|()| self.ctx.fs.write(&path, &bytes))
                .map_err(|e| Attempt::Retry(e.to_string()))
        })?;
        debug!("record saved");
        Ok(key)
    }

    /// Save on tokio's blocking pool. Await the handle to observe the result,
    /// or drop it to let the save finish unobserved.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_save<T: Record>(
        &self,
        value: T,
        key: Option<String>,
    ) -> JoinHandle<StorageResult<String>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save(&value, key.as_deref()))
    }

    /// Load the record `key` of type `T`; `Ok(None)` when it does not exist.
    ///
    /// A record that does not decrypt under the current master secret is
    /// deleted (unless purging is disabled) and reported as
    /// [`StorageError::StaleRecord`]. Read and decode failures are retried and
    /// leave the file in place.
    #[instrument(skip_all, fields(key = %key))]
    pub fn load<T: Record>(&self, key: &str) -> StorageResult<Option<T>> {
        let path = self.path_for::<T>(key)?;
        let _guard = self.ctx.lock()?;

        self.ctx.retry.run("load", || {
            let stored = match self.ctx.fs.read(&path) {
                Ok(Some(stored)) => stored,
                Ok(None) => return Ok(None),
                Err(e) => return Err(Attempt::Retry(e.to_string())),
            };
            let Some(plaintext) = self.ctx.unseal(key, stored) else {
                return Err(Attempt::Fatal(self.purge(&path, key)));
            };
            codec::decode(&plaintext)
                .map(Some)
                .map_err(|e| Attempt::Retry(e.to_string()))
        })
    }

    /// Load the record `key`, or `T::default()` when it is missing or was
    /// just purged as stale.
    pub fn load_or_create<T: Record + Default>(&self, key: &str) -> StorageResult<T> {
        match self.load(key) {
            Ok(Some(value)) => Ok(value),
            Ok(None) | Err(StorageError::StaleRecord { purged: true, .. }) => Ok(T::default()),
            Err(err) => Err(err),
        }
    }

    /// Keys of every stored record of type `T`, sorted.
    pub fn list_keys<T: Record>(&self) -> StorageResult<Vec<String>> {
        let folder = self.folder_for::<T>()?;
        self.keys_in(&folder)
    }

    /// Every loadable record of type `T`. Records that fail to load are skipped.
    pub fn list_all<T: Record>(&self) -> StorageResult<Vec<T>> {
        let mut values = Vec::new();
        for key in self.list_keys::<T>()? {
            match self.load::<T>(&key) {
                Ok(Some(value)) => values.push(value),
                Ok(None) => {}
                Err(err) => warn!(key = %key, %err, "skipping unreadable record"),
            }
        }
        Ok(values)
    }

    /// Delete the record `key` of type `T`. Missing records are not an error.
    #[instrument(skip_all, fields(key = %key))]
    pub fn delete<T: Record>(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for::<T>(key)?;
        let _guard = self.ctx.lock()?;
        self.ctx.retry.run("delete", || {
            self.ctx
                .fs
                .remove_file(&path)
                .map_err(|e| Attempt::Retry(e.to_string()))
        })
    }

    /// Delete every record of type `T`.
    #[instrument(skip_all)]
    pub fn delete_all<T: Record>(&self) -> StorageResult<()> {
        let folder = self.folder_for::<T>()?;
        let _guard = self.ctx.lock()?;
        self.ctx.retry.run("delete_all", || {
            let keys = self
                .keys_in(&folder)
                .map_err(|e| Attempt::Retry(e.to_string()))?;
            for key in keys {
                self.ctx
                    .fs
                    .remove_file(&self.file_in(&folder, &key))
                    .map_err(|e| Attempt::Retry(e.to_string()))?;
            }
            Ok(())
        })
    }

    fn keys_in(&self, folder: &Path) -> StorageResult<Vec<String>> {
        let suffix = format!(".{}", self.extension());
        let mut keys: Vec<String> = self
            .ctx
            .fs
            .list_files(folder, self.extension())
            .map_err(StorageError::storage)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn purge(&self, path: &Path, key: &str) -> StorageError {
        let purged = self.ctx.purge_stale_records
            && match self.ctx.fs.remove_file(path) {
                Ok(()) => true,
                Err(err) => {
                    warn!(%err, "failed to delete stale record");
                    false
                }
            };
        warn!(purged, "record does not decrypt with the current master secret");
        StorageError::StaleRecord {
            key: key.to_string(),
            purged,
        }
    }
}
