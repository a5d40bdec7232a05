//! Domain identifiers, the master secret lifecycle and per-record keys.

use std::fmt;

use lockbox_core::{SecureKeyValue, StorageError, StorageResult};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{crypto::KEY_LEN, identity::DeviceIdentity};

const PROBE_KEY: &str = "test";
const PROBE_VALUE: &str = "test";

/// Short stable identifier of a domain string; names the domain's folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainId(String);

impl DomainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First eight bytes of SHA-256 over the UTF-16LE domain string, read as a
/// little-endian integer and printed as unpadded lowercase hex.
pub fn domain_id(domain: &str) -> DomainId {
    let utf16: Vec<u8> = domain.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let digest = Sha256::digest(&utf16);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    DomainId(format!("{:x}", u64::from_le_bytes(head)))
}

/// Device and domain bound root key. Never written in plaintext; cleared
/// from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret([u8; KEY_LEN]);

impl MasterSecret {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

/// Backend slot holding the master secret: truncated hash of the machine name.
pub fn master_secret_slot(identity: &DeviceIdentity) -> String {
    let digest = Sha256::digest(identity.machine.as_bytes());
    hex::encode(&digest[..8])
}

/// Read the master secret from `backend`, creating and persisting one on first use.
pub fn resolve_master_secret(
    backend: &dyn SecureKeyValue,
    identity: &DeviceIdentity,
) -> StorageResult<MasterSecret> {
    let slot = master_secret_slot(identity);

    if let Some(stored) = backend.get(&slot)?.filter(|value| !value.is_empty()) {
        debug!("master secret found in backend");
        return decode_secret(&stored);
    }

    let mut seed = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(seed.as_mut());
    let digest: [u8; KEY_LEN] = Sha256::new()
        .chain_update(Zeroizing::new(hex::encode(*seed)).as_bytes())
        .chain_update(&identity.machine)
        .chain_update(&identity.user)
        .finalize()
        .into();

    backend.set(&slot, Some(&hex::encode(digest)))?;
    info!("created new master secret");
    Ok(MasterSecret(digest))
}

fn decode_secret(stored: &str) -> StorageResult<MasterSecret> {
    let bytes = Zeroizing::new(hex::decode(stored).map_err(|e| {
        StorageError::InvalidMasterSecret {
            reason: e.to_string(),
        }
    })?);
    let bytes: [u8; KEY_LEN] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| StorageError::InvalidMasterSecret {
                reason: format!("expected {KEY_LEN} bytes, got {}", bytes.len()),
            })?;
    Ok(MasterSecret(bytes))
}

/// Encryption key for one record: `SHA-256(secret || name)`. Recomputed per call.
pub fn derive_record_key(secret: &MasterSecret, name: &str) -> [u8; KEY_LEN] {
    Sha256::new()
        .chain_update(secret.as_bytes())
        .chain_update(name.as_bytes())
        .finalize()
        .into()
}

/// Write, read back and clear a probe value. Any error or a mismatching read
/// means the backend cannot be trusted with the master secret.
pub fn probe_backend(backend: &dyn SecureKeyValue) -> StorageResult<()> {
    backend.set(PROBE_KEY, Some(PROBE_VALUE))?;
    let read = backend.get(PROBE_KEY)?;
    backend.set(PROBE_KEY, None)?;
    match read.as_deref() {
        Some(PROBE_VALUE) => Ok(()),
        Some(_) => Err(StorageError::backend("probe value changed on read back")),
        None => Err(StorageError::backend("probe value missing after write")),
    }
}

#[cfg(test)]
mod tests {
    use lockbox_core::InMemorySecureKeyValue;

    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("build-host", "alice")
    }

    #[test]
    fn domain_id_is_stable_lowercase_hex() {
        let id = domain_id("com.example.app");
        assert_eq!(id, domain_id("com.example.app"));
        assert_ne!(id, domain_id("com.example.other"));
        assert!(!id.as_str().is_empty() && id.as_str().len() <= 16);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn master_secret_can_be_cleared() {
        let mut secret = MasterSecret::from_bytes([7u8; KEY_LEN]);
        secret.zeroize();
        assert_eq!(secret.as_bytes(), &[0u8; KEY_LEN]);
        assert_eq!(format!("{secret:?}"), "MasterSecret(..)");
    }

    #[test]
    fn record_key_is_deterministic() {
        let secret = MasterSecret::from_bytes([1u8; KEY_LEN]);
        let first = derive_record_key(&secret, "v_retries");
        assert_eq!(first, derive_record_key(&secret, "v_retries"));
        assert_ne!(first, derive_record_key(&secret, "v_retrie"));
        let other = MasterSecret::from_bytes([2u8; KEY_LEN]);
        assert_ne!(first, derive_record_key(&other, "v_retries"));
    }

    #[test]
    fn master_secret_is_created_once_and_reused() {
        let backend = InMemorySecureKeyValue::new();
        let first = resolve_master_secret(&backend, &identity()).expect("create");
        let second = resolve_master_secret(&backend, &identity()).expect("reuse");
        assert_eq!(first, second);

        let slot = master_secret_slot(&identity());
        assert_eq!(slot.len(), 16);
        let stored = backend.get(&slot).expect("get").expect("slot written");
        assert_eq!(stored, hex::encode(first.as_bytes()));
    }

    #[test]
    fn empty_slot_counts_as_absent() {
        let backend = InMemorySecureKeyValue::new();
        let slot = master_secret_slot(&identity());
        backend.set(&slot, Some("")).expect("set");
        let secret = resolve_master_secret(&backend, &identity()).expect("create");
        assert_eq!(
            backend.get(&slot).expect("get"),
            Some(hex::encode(secret.as_bytes()))
        );
    }

    #[test]
    fn malformed_slot_is_rejected() {
        let backend = InMemorySecureKeyValue::new();
        let slot = master_secret_slot(&identity());
        backend.set(&slot, Some("abcd")).expect("set");
        let err = resolve_master_secret(&backend, &identity()).expect_err("short secret");
        assert!(matches!(err, StorageError::InvalidMasterSecret { .. }));
    }

    #[test]
    fn probe_accepts_working_backend_and_cleans_up() {
        let backend = InMemorySecureKeyValue::new();
        probe_backend(&backend).expect("probe");
        assert!(backend.keys().is_empty());
    }

    #[test]
    fn probe_rejects_failing_backend() {
        assert!(probe_backend(&InMemorySecureKeyValue::failing()).is_err());
    }

    #[test]
    fn debug_does_not_print_secret_bytes() {
        let secret = MasterSecret::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(format!("{secret:?}"), "MasterSecret(..)");
    }
}
