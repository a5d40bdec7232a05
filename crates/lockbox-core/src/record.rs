use std::{any::type_name, borrow::Cow};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{StorageError, StorageResult};

/// Key used when neither the caller nor the record supplies one.
pub const DEFAULT_KEY: &str = "_default";

/// Characters that may not appear in a record key. In type folder names they
/// are replaced by [`FOLDER_FILLER`] instead.
pub const FORBIDDEN_CHARS: &[char] = &['*', '?', '/', '\\', '|', '<', '>', '\'', '"', ':'];

pub const FOLDER_FILLER: char = '-';

/// Longest file name most file systems accept.
pub const MAX_NAME_LEN: usize = 255;

/// Longest key in bytes: leaves room for the longest record extension (`.json`).
pub const MAX_KEY_LEN: usize = MAX_NAME_LEN - 5;

const VERSION_TOKEN: &str = "Version=";

/// A value the object store can persist.
///
/// Records are grouped on disk by [`Record::type_identifier`]; a record that
/// carries its own identity overrides [`Record::record_key`] so callers can
/// save it without naming a key.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable identifier of the record type, used to name its folder.
    fn type_identifier() -> Cow<'static, str> {
        Cow::Borrowed(type_name::<Self>())
    }

    /// Key under which this value saves itself when no key is given.
    fn record_key(&self) -> Option<String> {
        None
    }
}

macro_rules! plain_record {
    ($($ty:ty),* $(,)?) => {
        $(impl Record for $ty {})*
    };
}

plain_record!(bool, String, i16, u16, i32, u32, i64, u64, f64, DateTime<Utc>);

/// Reject keys that cannot name a file: empty, too long, or containing
/// forbidden or control characters.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key.contains(FORBIDDEN_CHARS)
        || key.chars().any(char::is_control)
    {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Folder name for a type identifier.
///
/// Identifiers embedding a version token collapse to `namespace+Name` so the
/// folder survives library upgrades. Forbidden characters become
/// [`FOLDER_FILLER`]; a result longer than [`MAX_NAME_LEN`] is an error.
pub fn type_folder(identifier: &str) -> StorageResult<String> {
    let base = if identifier.contains(VERSION_TOKEN) {
        Cow::Owned(collapse_versioned(identifier))
    } else {
        Cow::Borrowed(identifier)
    };

    let name: String = base
        .chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) {
                FOLDER_FILLER
            } else {
                c
            }
        })
        .collect();

    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(StorageError::TypeNameTooLong { name, len });
    }
    Ok(name)
}

fn collapse_versioned(identifier: &str) -> String {
    let head = identifier
        .split(['[', '<', ','])
        .next()
        .unwrap_or(identifier)
        .trim();

    let split = head
        .rfind("::")
        .map(|idx| (&head[..idx], &head[idx + 2..]))
        .or_else(|| head.rfind('.').map(|idx| (&head[..idx], &head[idx + 1..])));

    match split {
        Some((namespace, name)) => format!("{namespace}+{name}"),
        None => head.to_string(),
    }
}
