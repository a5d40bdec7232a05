use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use lockbox_core::{StorageError, StorageResult};

use crate::keys::DomainId;

/// Domains with a live `Storage`. Owned by the composition root and shared by
/// cloning; at most one lease per domain exists at a time.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    active: Arc<Mutex<HashSet<DomainId>>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `domain`, failing with `DomainInUse` while another lease is alive.
    pub fn acquire(&self, domain: &DomainId) -> StorageResult<DomainLease> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(domain.clone()) {
            return Err(StorageError::DomainInUse {
                domain: domain.to_string(),
            });
        }
        Ok(DomainLease {
            registry: self.clone(),
            domain: domain.clone(),
        })
    }

    pub fn is_active(&self, domain: &DomainId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(domain)
    }
}

/// Releases its domain when dropped.
#[derive(Debug)]
pub struct DomainLease {
    registry: DomainRegistry,
    domain: DomainId,
}

impl DomainLease {
    pub fn domain(&self) -> &DomainId {
        &self.domain
    }
}

impl Drop for DomainLease {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.domain);
    }
}
