use std::{path::PathBuf, sync::Arc};

use crate::config::{BackendKind, Config};
use color_eyre::Result;
use dirs::data_dir;
use lockbox_storage::{DomainRegistry, KeyringBackend, Storage};
use tracing::debug;

/// Resolve the default data directory for Lockbox.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("lockbox"))
}

/// Open the configured domain, claiming it in `registry`.
pub fn open_from_config(config: &Config, registry: &DomainRegistry) -> Result<Storage> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    debug!(?root, domain = %config.domain, "opening storage");

    let mut builder = Storage::builder(config.domain.clone(), root)
        .encrypted(config.encrypted)
        .retry(config.retry.policy());
    if config.backend == BackendKind::Keyring {
        builder = builder.backend(Arc::new(KeyringBackend::new(
            config.keyring_service.clone(),
        )));
    }
    Ok(builder.open(registry)?)
}

/// Config for tests: a temp data dir and the internal secret backend.
#[cfg(test)]
pub fn test_config(root: impl Into<PathBuf>) -> Config {
    Config {
        data_dir: Some(root.into()),
        backend: BackendKind::Internal,
        retry: crate::config::RetryConfig {
            attempts: 3,
            delay_ms: 1,
        },
        ..Config::default()
    }
}
