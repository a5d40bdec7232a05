use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use lockbox_core::{FileSystem, SecureKeyValue, StorageError, StorageResult};
use tracing::{info, instrument, warn};

use crate::{
    backend::{InternalBackend, ScopedBackend},
    blob_store::BlobStore,
    context::StoreContext,
    fs::LocalFileSystem,
    identity::DeviceIdentity,
    keys::{domain_id, probe_backend, resolve_master_secret, DomainId},
    object_store::ObjectStore,
    registry::{DomainLease, DomainRegistry},
    retry::RetryPolicy,
};

/// Which backend ended up holding the master secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCapability {
    /// The caller supplied backend passed the startup probe.
    Secure,
    /// No backend was supplied; the internal one is in use.
    Internal,
    /// The supplied backend failed the probe; the internal one is used for
    /// the rest of this session.
    Fallback { reason: String },
}

impl BackendCapability {
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Secure)
    }
}

/// Configures and opens a [`Storage`].
pub struct StorageBuilder {
    domain: String,
    root: PathBuf,
    backend: Option<Arc<dyn SecureKeyValue>>,
    encrypted: bool,
    retry: RetryPolicy,
    purge_stale_records: bool,
    identity: Option<DeviceIdentity>,
    fs: Option<Arc<dyn FileSystem>>,
}

impl StorageBuilder {
    /// Secure key/value backend for the master secret. Without one (or when it
    /// fails the startup probe) the internal fallback is used.
    pub fn backend(mut self, backend: Arc<dyn SecureKeyValue>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Encrypt records at rest. On by default.
    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Delete object records that no longer decrypt. On by default.
    pub fn purge_stale_records(mut self, purge: bool) -> Self {
        self.purge_stale_records = purge;
        self
    }

    /// Machine and user names; defaults to [`DeviceIdentity::current`].
    pub fn identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Claim the domain in `registry`, settle the secret backend and resolve
    /// the master secret.
    #[instrument(skip_all, fields(domain = %self.domain))]
    pub fn open(self, registry: &DomainRegistry) -> StorageResult<Storage> {
        let domain = domain_id(&self.domain);
        let lease = registry.acquire(&domain)?;
        let fs = self.fs.unwrap_or_else(|| Arc::new(LocalFileSystem));
        let identity = self.identity.unwrap_or_else(DeviceIdentity::current);

        let internal = || -> Arc<dyn SecureKeyValue> {
            Arc::new(InternalBackend::new(
                fs.clone(),
                self.root.clone(),
                domain.clone(),
                &identity,
            ))
        };

        let (backend, capability) = match self.backend {
            None => (internal(), BackendCapability::Internal),
            Some(inner) => {
                let scoped = ScopedBackend::new(inner, domain.clone());
                match probe_backend(&scoped) {
                    Ok(()) => (
                        Arc::new(scoped) as Arc<dyn SecureKeyValue>,
                        BackendCapability::Secure,
                    ),
                    Err(err) => {
                        warn!(%err, "secure backend failed probe; using internal backend");
                        (
                            internal(),
                            BackendCapability::Fallback {
                                reason: err.to_string(),
                            },
                        )
                    }
                }
            }
        };

        let secret = resolve_master_secret(backend.as_ref(), &identity)?;
        let ctx = Arc::new(StoreContext::new(
            fs,
            self.root.join(domain.as_str()),
            secret,
            self.encrypted,
            self.retry,
            self.purge_stale_records,
        ));
        info!(?capability, encrypted = self.encrypted, "storage opened");

        Ok(Storage {
            objects: ObjectStore::new(ctx.clone()),
            blobs: BlobStore::new(ctx.clone()),
            ctx,
            capability,
            lease,
        })
    }
}

/// One logical domain of encrypted records. Holds the domain's registry
/// lease until closed or dropped.
pub struct Storage {
    ctx: Arc<StoreContext>,
    objects: ObjectStore,
    blobs: BlobStore,
    capability: BackendCapability,
    lease: DomainLease,
}

impl Storage {
    /// Start configuring a storage for `domain` under the base directory `root`.
    pub fn builder(domain: impl Into<String>, root: impl Into<PathBuf>) -> StorageBuilder {
        StorageBuilder {
            domain: domain.into(),
            root: root.into(),
            backend: None,
            encrypted: true,
            retry: RetryPolicy::default(),
            purge_stale_records: true,
            identity: None,
            fs: None,
        }
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn domain_id(&self) -> &DomainId {
        self.lease.domain()
    }

    /// Directory holding every record of this domain.
    pub fn domain_root(&self) -> &Path {
        &self.ctx.domain_root
    }

    pub fn capability(&self) -> &BackendCapability {
        &self.capability
    }

    pub fn is_encrypted(&self) -> bool {
        self.ctx.encrypted
    }

    /// Delete every record of the domain. The master secret is kept.
    #[instrument(skip_all, fields(domain = %self.domain_id()))]
    pub fn wipe(&self) -> StorageResult<()> {
        let _guard = self.ctx.lock()?;
        self.ctx
            .fs
            .remove_dir_all(&self.ctx.domain_root)
            .map_err(StorageError::storage)?;
        info!("domain wiped");
        Ok(())
    }

    /// Release the domain so another `Storage` may open it.
    pub fn close(self) {
        drop(self);
    }
}
