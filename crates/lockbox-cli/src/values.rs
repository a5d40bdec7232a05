use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use lockbox_storage::Storage;
use lockbox_values::{Value, Values};

use crate::cli::ValueKind;

macro_rules! dispatch {
    ($kind:expr, $func:ident($($arg:expr),*)) => {
        match $kind {
            ValueKind::Bool => $func::<bool>($($arg),*),
            ValueKind::String => $func::<String>($($arg),*),
            ValueKind::I16 => $func::<i16>($($arg),*),
            ValueKind::U16 => $func::<u16>($($arg),*),
            ValueKind::I32 => $func::<i32>($($arg),*),
            ValueKind::U32 => $func::<u32>($($arg),*),
            ValueKind::I64 => $func::<i64>($($arg),*),
            ValueKind::U64 => $func::<u64>($($arg),*),
            ValueKind::F64 => $func::<f64>($($arg),*),
            ValueKind::Timestamp => $func::<DateTime<Utc>>($($arg),*),
        }
    };
}

/// Text form of a stored value, `None` when it is not set.
pub fn get(storage: &Storage, kind: ValueKind, name: &str) -> Result<Option<String>> {
    let values = Values::new(storage.objects().clone());
    dispatch!(kind, read(&values, name))
}

/// Parse `raw` as `kind` and store it in the background writer.
pub async fn set(storage: &Storage, kind: ValueKind, name: &str, raw: &str) -> Result<()> {
    let handle = dispatch!(kind, spawn_write(storage, kind, name, raw))?;
    handle.await??;
    Ok(())
}

pub fn delete(storage: &Storage, kind: ValueKind, name: &str) -> Result<()> {
    let values = Values::new(storage.objects().clone());
    dispatch!(kind, remove(&values, name))
}

pub fn names(storage: &Storage, kind: ValueKind) -> Result<Vec<String>> {
    let values = Values::new(storage.objects().clone());
    dispatch!(kind, list(&values))
}

fn read<T: Value + Display>(values: &Values, name: &str) -> Result<Option<String>> {
    Ok(values.try_get::<T>(name)?.map(|value| value.to_string()))
}

type SaveHandle = tokio::task::JoinHandle<lockbox_core::StorageResult<String>>;

fn spawn_write<T>(storage: &Storage, kind: ValueKind, name: &str, raw: &str) -> Result<SaveHandle>
where
    T: Value + FromStr,
    T::Err: Display,
{
    let value: T = raw
        .parse()
        .map_err(|err| eyre!("invalid {kind} value {raw:?}: {err}"))?;
    Ok(storage
        .objects()
        .spawn_save(value, Some(Values::record_key(name))))
}

fn remove<T: Value>(values: &Values, name: &str) -> Result<()> {
    Ok(values.remove::<T>(name)?)
}

fn list<T: Value>(values: &Values) -> Result<Vec<String>> {
    Ok(values.names::<T>()?)
}
