//! The storage envelope: the struct that gets serialized, encrypted, and
//! embedded into the carrier image, plus its own encrypt/decrypt
//! operations and the vault-wide (not per-item) two-factor-authentication
//! state.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::KEY_LEN;
use crate::crypto;
use crate::error::{ImcryptError, Result};
use crate::keycache;
use crate::model::Database;
use crate::serialize;

/// The on-disk (pre-steganography) envelope: identity, salts, the encrypted
/// database blob, its integrity seal, and vault-wide 2FA state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    pub id: String,
    pub encryption_salt: Vec<u8>,
    pub password_salt: Vec<u8>,

    pub encrypted_database: Vec<u8>,
    pub hmac: Vec<u8>,

    pub two_factor_secret: Option<String>,
    pub two_factor_confirmed: bool,
    pub two_factor_recovery_hash: Option<[u8; 32]>,
    pub two_factor_recovery_salt: Option<Vec<u8>>,
}

impl Storage {
    pub fn new(id: String, encryption_salt: Vec<u8>, password_salt: Vec<u8>) -> Self {
        Storage {
            id,
            encryption_salt,
            password_salt,
            encrypted_database: Vec::new(),
            hmac: Vec::new(),
            two_factor_secret: None,
            two_factor_confirmed: false,
            two_factor_recovery_hash: None,
            two_factor_recovery_salt: None,
        }
    }

    pub fn has_two_factor_authentication(&self) -> bool {
        self.two_factor_confirmed
    }

    /// Encrypts and seals `database`, storing the result on `self`.
    ///
    /// Fetches the cached key, checks it against `self.id` (clearing the
    /// cache and returning [`ImcryptError::IdentityMismatch`] on a mismatch,
    /// matching the original's defensive re-check before every write),
    /// derives the encryption key from the cached password hash and this
    /// envelope's own encryption salt, then signs, encrypts, and seals.
    pub fn set_database(&mut self, database: &Database) -> Result<()> {
        let cached = keycache::get_for_storage(&self.id)?;

        let mut key_bytes = [0u8; KEY_LEN];
        let derived = crypto::hash(&cached.key, &self.encryption_salt);
        key_bytes.copy_from_slice(&derived);

        let gobbed = serialize::serialize(database)?;
        let signed = serialize::sign(&gobbed);
        let encrypted = crypto::encrypt(&signed, &key_bytes)?;
        let hmac = crypto::generate_hmac(&encrypted, &cached.key);

        self.encrypted_database = encrypted;
        self.hmac = hmac.to_vec();

        Ok(())
    }

    /// Decrypts and validates the stored database, mirroring
    /// [`set_database`]'s key derivation and validating the HMAC seal
    /// before decrypting and unsigning.
    pub fn get_database(&self) -> Result<Database> {
        let cached = keycache::get_for_storage(&self.id)?;

        if !crypto::validate_hmac(&self.encrypted_database, &cached.key, &self.hmac) {
            warn!(storage_id = %self.id, "HMAC validation failed while reading storage");
            return Err(ImcryptError::IntegrityCheckFailed);
        }

        let mut key_bytes = [0u8; KEY_LEN];
        let derived = crypto::hash(&cached.key, &self.encryption_salt);
        key_bytes.copy_from_slice(&derived);

        let decrypted = crypto::decrypt(&self.encrypted_database, &key_bytes)?;
        let unsigned = serialize::unsign(&decrypted)?;
        serialize::deserialize(unsigned)
    }

    /// Clears vault-wide two-factor state entirely (opt-out).
    pub fn delete_two_factor_secret(&mut self) {
        self.two_factor_secret = None;
        self.two_factor_confirmed = false;
        self.two_factor_recovery_hash = None;
        self.two_factor_recovery_salt = None;
    }

    /// Runs the half-enrollment sweep: if 2FA was never confirmed but a
    /// recovery code was already issued (the user abandoned enrollment
    /// partway through), clears the leftover recovery hash/salt and secret
    /// so a stale, never-confirmed secret doesn't linger. Called after a
    /// successful unlock.
    pub fn sweep_unconfirmed_two_factor(&mut self) -> bool {
        if !self.two_factor_confirmed && self.two_factor_recovery_hash.is_some() {
            self.two_factor_secret = None;
            self.two_factor_recovery_hash = None;
            self.two_factor_recovery_salt = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked_storage() -> Storage {
        keycache::delete();
        let id = "storage-id".to_string();
        let password_salt = crypto::generate_salt(8);
        let encryption_salt = crypto::generate_salt(8);
        let password_hash = crypto::hash(b"master-password", &password_salt);
        keycache::set(id.clone(), password_hash.to_vec());
        Storage::new(id, encryption_salt, password_salt)
    }

    #[test]
    fn set_and_get_database_roundtrip() {
        let _guard = keycache::test_lock();
        let mut storage = unlocked_storage();
        let db = Database::new();
        storage.set_database(&db).unwrap();
        let roundtripped = storage.get_database().unwrap();
        assert_eq!(roundtripped.items.len(), db.items.len());
        keycache::delete();
    }

    #[test]
    fn tampered_ciphertext_fails_integrity_check() {
        let _guard = keycache::test_lock();
        let mut storage = unlocked_storage();
        storage.set_database(&Database::new()).unwrap();
        if let Some(byte) = storage.encrypted_database.first_mut() {
            *byte ^= 0xFF;
        }
        let result = storage.get_database();
        assert!(matches!(result, Err(ImcryptError::IntegrityCheckFailed)));
        keycache::delete();
    }

    #[test]
    fn identity_mismatch_clears_cache() {
        let _guard = keycache::test_lock();
        let mut storage = unlocked_storage();
        keycache::set("different-id".to_string(), vec![1, 2, 3]);
        let result = storage.set_database(&Database::new());
        assert!(matches!(result, Err(ImcryptError::IdentityMismatch)));
        assert!(keycache::get().is_err());
    }

    #[test]
    fn sweep_clears_unconfirmed_two_factor_state() {
        let mut storage = unlocked_storage();
        storage.two_factor_secret = Some("SECRET".to_string());
        storage.two_factor_recovery_hash = Some([1u8; 32]);
        storage.two_factor_recovery_salt = Some(vec![1, 2, 3]);
        storage.two_factor_confirmed = false;

        let swept = storage.sweep_unconfirmed_two_factor();
        assert!(swept);
        assert!(storage.two_factor_secret.is_none());
        assert!(storage.two_factor_recovery_hash.is_none());
    }

    #[test]
    fn sweep_leaves_confirmed_two_factor_alone() {
        let mut storage = unlocked_storage();
        storage.two_factor_secret = Some("SECRET".to_string());
        storage.two_factor_confirmed = true;

        let swept = storage.sweep_unconfirmed_two_factor();
        assert!(!swept);
        assert!(storage.two_factor_secret.is_some());
    }
}
