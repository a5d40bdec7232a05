//! Typed application settings on top of the object store: each value is a
//! record named `v_<name>` in the folder of its primitive type.

use chrono::{DateTime, Utc};
use lockbox_core::{Record, StorageResult};
use lockbox_storage::ObjectStore;
use tracing::{instrument, warn};

const VALUE_PREFIX: &str = "v_";

/// Primitive types that can be stored as a named value.
pub trait Value: Record + Clone {}

macro_rules! value_types {
    ($($ty:ty),* $(,)?) => {
        $(impl Value for $ty {})*
    };
}

value_types!(bool, String, i16, u16, i32, u32, i64, u64, f64, DateTime<Utc>);

/// Named value access backed by an [`ObjectStore`].
#[derive(Clone)]
pub struct Values {
    objects: ObjectStore,
}

impl Values {
    pub fn new(objects: ObjectStore) -> Self {
        Self { objects }
    }

    /// Record key for the value `name`.
    pub fn record_key(name: &str) -> String {
        format!("{VALUE_PREFIX}{name}")
    }

    /// The stored value, surfacing absence and errors.
    pub fn try_get<T: Value>(&self, name: &str) -> StorageResult<Option<T>> {
        self.objects.load::<T>(&Self::record_key(name))
    }

    /// The stored value, or `default` when it is absent or cannot be read.
    #[instrument(skip(self, default))]
    pub fn get<T: Value>(&self, name: &str, default: T) -> T {
        match self.try_get::<T>(name) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                warn!(%err, "value unreadable; using default");
                default
            }
        }
    }

    #[instrument(skip(self, value))]
    pub fn set<T: Value>(&self, name: &str, value: T) -> StorageResult<()> {
        self.objects
            .save(&value, Some(&Self::record_key(name)))
            .map(|_| ())
    }

    #[instrument(skip(self))]
    pub fn remove<T: Value>(&self, name: &str) -> StorageResult<()> {
        self.objects.delete::<T>(&Self::record_key(name))
    }

    /// Names of every stored value of type `T`.
    pub fn names<T: Value>(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .objects
            .list_keys::<T>()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(VALUE_PREFIX).map(str::to_string))
            .collect())
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name, default)
    }

    pub fn set_bool(&self, name: &str, value: bool) -> StorageResult<()> {
        self.set(name, value)
    }

    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get(name, default.to_string())
    }

    /// `None` removes the value.
    pub fn set_string(&self, name: &str, value: Option<&str>) -> StorageResult<()> {
        match value {
            Some(value) => self.set(name, value.to_string()),
            None => self.remove::<String>(name),
        }
    }

    pub fn get_i32(&self, name: &str, default: i32) -> i32 {
        self.get(name, default)
    }

    pub fn set_i32(&self, name: &str, value: i32) -> StorageResult<()> {
        self.set(name, value)
    }

    pub fn get_u64(&self, name: &str, default: u64) -> u64 {
        self.get(name, default)
    }

    pub fn set_u64(&self, name: &str, value: u64) -> StorageResult<()> {
        self.set(name, value)
    }

    pub fn get_f64(&self, name: &str, default: f64) -> f64 {
        self.get(name, default)
    }

    pub fn set_f64(&self, name: &str, value: f64) -> StorageResult<()> {
        self.set(name, value)
    }

    pub fn get_timestamp(&self, name: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        self.get(name, default)
    }

    pub fn set_timestamp(&self, name: &str, value: DateTime<Utc>) -> StorageResult<()> {
        self.set(name, value)
    }
}
