//! Low-level cryptographic primitives: key derivation, authenticated
//! encryption, and HMAC sealing.
//!
//! A random 12-byte nonce is prepended to the AES-256-GCM ciphertext+tag,
//! keys are derived with PBKDF2-HMAC-SHA256 at 100,000 iterations, and the
//! HMAC seal covers the whole encrypted blob.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::config::{HMAC_LEN, KEY_LEN, NONCE_LEN, PBKDF2_ITERATIONS};
use crate::error::{ImcryptError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Fills `out` with cryptographically random bytes.
pub fn random_bytes(out: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(out);
}

/// Generates a random salt of the given length.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    random_bytes(&mut salt);
    salt
}

/// Derives a 32-byte key (or hash) from `payload` and `salt` using
/// PBKDF2-HMAC-SHA256. Used both for the master encryption key and as a
/// general-purpose password/recovery-code hash.
pub fn hash(payload: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(payload, salt, PBKDF2_ITERATIONS, &mut out);
    out
}

/// Encrypts `plaintext` under `key` with a fresh random nonce. Returns
/// `nonce || ciphertext || tag`.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    random_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| ImcryptError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypts a blob produced by [`encrypt`].
pub fn decrypt(blob: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(ImcryptError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| ImcryptError::DecryptionFailed)
}

/// Computes an HMAC-SHA256 tag over `data` under `key`.
pub fn generate_hmac(data: &[u8], key: &[u8]) -> [u8; HMAC_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let mut out = [0u8; HMAC_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Validates an HMAC-SHA256 tag over `data` under `key`, in constant time.
pub fn validate_hmac(data: &[u8], key: &[u8], expected: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.verify_slice(expected).is_ok()
}
