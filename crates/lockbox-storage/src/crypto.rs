//! Record envelope: `IV (16 bytes) || AES-256-CBC/PKCS7 ciphertext`.
//!
//! The encrypted plaintext starts with an 8 byte check value derived from the
//! key, so a wrong key is rejected even when the padding happens to unpad.
//!
//! Every call builds its own cipher from the given key and IV, so the
//! functions are safe to call from any number of threads at once.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::sealed;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const CHECK_LEN: usize = 8;
const CHECK_LABEL: &[u8] = b"lockbox.envelope.check";

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt `plaintext` under a fresh random IV and return `IV || ciphertext`.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut body = Vec::with_capacity(CHECK_LEN + plaintext.len());
    body.extend_from_slice(&check_value(key));
    body.extend_from_slice(plaintext);

    let ciphertext =
        Aes256CbcEnc::new(&(*key).into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(&body);

    let mut envelope = Vec::with_capacity(IV_LEN + ciphertext.len());
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ciphertext);
    envelope
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// When the envelope does not decrypt, the whole blob is retried as a legacy
/// sealed box addressed to `key` used as a raw X25519 private key. `None`
/// means no plaintext is available under this key.
pub fn decrypt(envelope: &[u8], key: &[u8; KEY_LEN]) -> Option<Vec<u8>> {
    decrypt_envelope(envelope, key).or_else(|| sealed::open(key, envelope))
}

fn decrypt_envelope(envelope: &[u8], key: &[u8; KEY_LEN]) -> Option<Vec<u8>> {
    if envelope.len() < IV_LEN + BLOCK_LEN {
        return None;
    }
    let (iv, body) = envelope.split_at(IV_LEN);
    if body.len() % BLOCK_LEN != 0 {
        return None;
    }
    let iv: [u8; IV_LEN] = iv.try_into().ok()?;

    let mut plaintext = Aes256CbcDec::new(&(*key).into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .ok()?;
    if plaintext.len() < CHECK_LEN || plaintext[..CHECK_LEN] != check_value(key) {
        return None;
    }
    plaintext.drain(..CHECK_LEN);
    Some(plaintext)
}

fn check_value(key: &[u8; KEY_LEN]) -> [u8; CHECK_LEN] {
    let digest = Sha256::new()
        .chain_update(CHECK_LABEL)
        .chain_update(key)
        .finalize();
    let mut check = [0u8; CHECK_LEN];
    check.copy_from_slice(&digest[..CHECK_LEN]);
    check
}
