use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::error::{StorageError, StorageResult};

/// Storage for the handful of secrets Lockbox keeps outside the file tree
/// (in practice: the master secret). Ideally hardware isolated.
pub trait SecureKeyValue: Send + Sync {
    /// Read the value stored under `key`, `None` when the slot is empty.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`; `None` clears the slot (idempotent).
    fn set(&self, key: &str, value: Option<&str>) -> StorageResult<()>;
}

impl<T: SecureKeyValue + ?Sized> SecureKeyValue for Arc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        (**self).set(key, value)
    }
}

/// In-memory backend for tests and smoke runs. Clones share the same slots.
/// Not secure: values are kept in plain process memory.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecureKeyValue {
    inner: Arc<Mutex<HashMap<String, String>>>,
    failing: bool,
}

impl InMemorySecureKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every call fails, to exercise the capability fallback.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Slot names currently holding a value.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing {
            return Err(StorageError::backend("secure storage unavailable"));
        }
        Ok(())
    }
}

impl SecureKeyValue for InMemorySecureKeyValue {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check()?;
        let map = self
            .inner
            .lock()
            .map_err(|err| StorageError::backend(format!("lock poisoned: {err}")))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        self.check()?;
        let mut map = self
            .inner
            .lock()
            .map_err(|err| StorageError::backend(format!("lock poisoned: {err}")))?;
        match value {
            Some(value) => {
                map.insert(key.to_string(), value.to_string());
            }
            None => {
                map.remove(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_clear() {
        let backend = InMemorySecureKeyValue::new();
        backend.set("slot", Some("secret")).expect("set");
        assert_eq!(backend.get("slot").expect("get").as_deref(), Some("secret"));

        backend.set("slot", None).expect("clear");
        backend.set("slot", None).expect("clear again");
        assert_eq!(backend.get("slot").expect("get"), None);
    }

    #[test]
    fn clones_share_slots() {
        let backend = InMemorySecureKeyValue::new();
        let clone = backend.clone();
        clone.set("a", Some("1")).expect("set");
        assert_eq!(backend.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn failing_backend_rejects_every_call() {
        let backend = InMemorySecureKeyValue::failing();
        assert!(matches!(
            backend.set("a", Some("1")),
            Err(StorageError::Backend { .. })
        ));
        assert!(matches!(backend.get("a"), Err(StorageError::Backend { .. })));
    }
}
