//! JSON encoding of records, shared by the object and blob stores.

use lockbox_core::{Record, StorageError, StorageResult};

/// Serialize `value`, refusing values that would not decode again.
///
/// `serde_json` writes non-finite floats as `null`, which no `f64` field can
/// read back; such a record would be unreadable once saved.
pub(crate) fn encode<T: Record>(value: &T) -> StorageResult<Vec<u8>> {
    let bytes = serde_json::to_vec(value).map_err(serialization)?;
    serde_json::from_slice::<T>(&bytes).map_err(|e| StorageError::Serialization {
        reason: format!("value does not survive encoding: {e}"),
    })?;
    Ok(bytes)
}

pub(crate) fn decode<T: Record>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}

fn serialization(err: serde_json::Error) -> StorageError {
    StorageError::Serialization {
        reason: err.to_string(),
    }
}
