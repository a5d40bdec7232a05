//! Anonymous public-key boxes: `ephemeral_pub (32) || nonce (12) || AES-256-GCM ciphertext`.
//!
//! Used by the internal secret backend and understood by the record decrypt
//! fallback for blobs written by the legacy scheme.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

const PUBLIC_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` so only the holder of `recipient`'s secret can read it.
/// `None` when `recipient` is a low-order point.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Option<Vec<u8>> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let key = box_key(&ephemeral, recipient, &ephemeral_public, recipient)?;

    let cipher = Aes256Gcm::new(&key.into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher.encrypt(&nonce, plaintext).ok()?;

    let mut out = Vec::with_capacity(PUBLIC_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Some(out)
}

/// Open a box addressed to the public key of `secret`. `None` on any failure.
pub fn open(secret: &[u8; 32], blob: &[u8]) -> Option<Vec<u8>> {
    if blob.len() <= PUBLIC_LEN + NONCE_LEN {
        return None;
    }
    let (ephemeral_public, rest) = blob.split_at(PUBLIC_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let ephemeral_public: [u8; PUBLIC_LEN] = ephemeral_public.try_into().ok()?;
    let ephemeral_public = PublicKey::from(ephemeral_public);
    let secret = StaticSecret::from(*secret);
    let recipient = PublicKey::from(&secret);
    let key = box_key(&secret, &ephemeral_public, &ephemeral_public, &recipient)?;

    Aes256Gcm::new(&key.into())
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()
}

fn box_key(
    own: &StaticSecret,
    peer: &PublicKey,
    ephemeral_public: &PublicKey,
    recipient: &PublicKey,
) -> Option<[u8; 32]> {
    let shared = own.diffie_hellman(peer);
    if !shared.was_contributory() {
        return None;
    }
    Some(
        Sha256::new()
            .chain_update(shared.as_bytes())
            .chain_update(ephemeral_public.as_bytes())
            .chain_update(recipient.as_bytes())
            .finalize()
            .into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> ([u8; 32], PublicKey) {
        let bytes = [seed; 32];
        (bytes, PublicKey::from(&StaticSecret::from(bytes)))
    }

    #[test]
    fn seal_then_open() {
        let (secret, public) = keypair(3);
        let blob = seal(&public, b"master-secret-hex").expect("seal");
        assert_eq!(open(&secret, &blob).as_deref(), Some(&b"master-secret-hex"[..]));
    }

    #[test]
    fn other_secret_cannot_open() {
        let (_, public) = keypair(3);
        let (other, _) = keypair(4);
        let blob = seal(&public, b"payload").expect("seal");
        assert_eq!(open(&other, &blob), None);
    }

    #[test]
    fn tampered_or_short_blob_is_rejected() {
        let (secret, public) = keypair(5);
        let mut blob = seal(&public, b"payload").expect("seal");
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert_eq!(open(&secret, &blob), None);
        assert_eq!(open(&secret, &blob[..PUBLIC_LEN + NONCE_LEN]), None);
    }

    #[test]
    fn non_contributory_peer_is_rejected() {
        let (secret, _) = keypair(6);
        let mut blob = vec![0u8; PUBLIC_LEN + NONCE_LEN + 32];
        blob[PUBLIC_LEN] = 1;
        assert_eq!(open(&secret, &blob), None);
    }
}
