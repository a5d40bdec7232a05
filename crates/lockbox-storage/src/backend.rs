//! Secure key/value backends for the master secret.

use std::{path::PathBuf, sync::Arc};

use lockbox_core::{FileSystem, SecureKeyValue, StorageError, StorageResult};
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{identity::DeviceIdentity, keys::DomainId, sealed};

/// OS keychain backend through the `keyring` crate. Each slot is an account
/// under one service name. Built with the macOS, Windows and Secret Service
/// stores; a host without one fails the startup probe.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> StorageResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(StorageError::backend)
    }
}

impl SecureKeyValue for KeyringBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        // Keyring operations are synchronous, like the rest of the engine.
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(StorageError::backend(err)),
        }
    }

    fn set(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        let entry = self.entry(key)?;
        match value {
            Some(value) => entry.set_password(value).map_err(StorageError::backend),
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(err) => Err(StorageError::backend(err)),
            },
        }
    }
}

type Getter = dyn Fn(&str) -> StorageResult<Option<String>> + Send + Sync;
type Setter = dyn Fn(&str, Option<&str>) -> StorageResult<()> + Send + Sync;

/// Backend built from a caller supplied getter/setter pair, typically bridging
/// to a platform secure enclave.
pub struct FnBackend {
    get: Box<Getter>,
    set: Box<Setter>,
}

impl FnBackend {
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&str) -> StorageResult<Option<String>> + Send + Sync + 'static,
        S: Fn(&str, Option<&str>) -> StorageResult<()> + Send + Sync + 'static,
    {
        Self {
            get: Box::new(get),
            set: Box::new(set),
        }
    }
}

impl SecureKeyValue for FnBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (self.get)(key)
    }

    fn set(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        (self.set)(key, value)
    }
}

/// Namespaces every slot of a shared backend as `<domainId>.<key>`.
pub struct ScopedBackend {
    inner: Arc<dyn SecureKeyValue>,
    domain: DomainId,
}

impl ScopedBackend {
    pub fn new(inner: Arc<dyn SecureKeyValue>, domain: DomainId) -> Self {
        Self { inner, domain }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}.{key}", self.domain)
    }
}

impl SecureKeyValue for ScopedBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(&self.scoped(key))
    }

    fn set(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        self.inner.set(&self.scoped(key), value)
    }
}

/// Fallback used when no trustworthy secure storage exists.
///
/// Values are sealed to an X25519 key derived from the domain, machine and
/// user names and written as flat files. Anyone who knows those names can
/// rebuild the key: this keeps secrets out of plain sight, nothing more.
pub struct InternalBackend {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    domain: DomainId,
    secret: Zeroizing<[u8; 32]>,
}

impl InternalBackend {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        dir: impl Into<PathBuf>,
        domain: DomainId,
        identity: &DeviceIdentity,
    ) -> Self {
        let secret = Zeroizing::new(
            Sha256::new()
                .chain_update(domain.as_str())
                .chain_update(&identity.machine)
                .chain_update(&identity.user)
                .finalize()
                .into(),
        );
        Self {
            fs,
            dir: dir.into(),
            domain,
            secret,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let slot = format!("{}.{key}", self.domain);
        let digest = Sha256::new()
            .chain_update(slot.as_bytes())
            .chain_update(self.domain.as_str())
            .finalize();
        self.dir.join(hex::encode_upper(digest))
    }

    fn public_key(&self) -> PublicKey {
        PublicKey::from(&StaticSecret::from(*self.secret))
    }
}

impl SecureKeyValue for InternalBackend {
    #[instrument(skip_all)]
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let Some(blob) = self.fs.read(&self.path_for(key)).map_err(StorageError::backend)? else {
            return Ok(None);
        };
        match sealed::open(&self.secret, &blob).map(String::from_utf8) {
            Some(Ok(value)) => Ok(Some(value)),
            // Sealed for another machine or user: treat the slot as empty.
            _ => {
                warn!("stored secret value cannot be opened; ignoring it");
                Ok(None)
            }
        }
    }

    #[instrument(skip_all)]
    fn set(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        let path = self.path_for(key);
        match value {
            None => self.fs.remove_file(&path).map_err(StorageError::backend),
            Some(value) => {
                let blob = sealed::seal(&self.public_key(), value.as_bytes())
                    .ok_or_else(|| StorageError::backend("cannot seal value"))?;
                self.fs.write(&path, &blob).map_err(StorageError::backend)
            }
        }
    }
}
