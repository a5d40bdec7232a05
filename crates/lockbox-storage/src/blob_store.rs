//! Opaque byte payloads stored as `<domain root>/<key>.dat`.
//!
//! Single attempt per call: blobs are large and rarely contended. Typed
//! values can be stored in a blob too, JSON encoded inside the envelope.

use std::{path::PathBuf, sync::Arc};

use lockbox_core::{record::validate_key, Record, StorageError, StorageResult};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::{codec, context::StoreContext};

const BLOB_EXT: &str = "dat";

#[derive(Clone)]
pub struct BlobStore {
    ctx: Arc<StoreContext>,
}

impl BlobStore {
    pub(crate) fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.ctx.domain_root.join(format!("{key}.{BLOB_EXT}")))
    }

    #[instrument(skip_all, fields(key = %key, len = data.len()))]
    pub fn save(&self, data: &[u8], key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let bytes = self.ctx.seal(key, data.to_vec());

        let _guard = self.ctx.lock()?;
        self.ctx
            .fs
            .create_dir_all(&self.ctx.domain_root)
            .and_then(|()| self.ctx.fs.write(&path, &bytes))
            .map_err(StorageError::storage)?;
        debug!("blob saved");
        Ok(())
    }

    /// `Ok(None)` when no blob exists under `key`. A blob that does not decrypt
    /// is reported as stale and left on disk.
    #[instrument(skip_all, fields(key = %key))]
    pub fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        let stored = {
            let _guard = self.ctx.lock()?;
            self.ctx.fs.read(&path).map_err(StorageError::storage)?
        };
        let Some(stored) = stored else {
            return Ok(None);
        };
        match self.ctx.unseal(key, stored) {
            Some(data) => Ok(Some(data)),
            None => {
                warn!("blob does not decrypt with the current master secret");
                Err(StorageError::StaleRecord {
                    key: key.to_string(),
                    purged: false,
                })
            }
        }
    }

    /// Encode `value` and store it as the blob `key`.
    pub fn save_object<T: Record>(&self, value: &T, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let bytes = codec::encode(value)?;
        self.save(&bytes, key)
    }

    /// [`BlobStore::save_object`] on tokio's blocking pool.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_save_object<T: Record>(
        &self,
        value: T,
        key: String,
    ) -> JoinHandle<StorageResult<()>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save_object(&value, &key))
    }

    /// Decode the blob `key` as a `T`. Bytes that do not decode are a
    /// [`StorageError::Serialization`] error; the blob is kept.
    pub fn load_object<T: Record>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(bytes) = self.load(key)? else {
            return Ok(None);
        };
        codec::decode(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })
    }

    #[instrument(skip_all, fields(key = %key))]
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let _guard = self.ctx.lock()?;
        self.ctx
            .fs
            .remove_file(&path)
            .map_err(StorageError::storage)
    }
}
