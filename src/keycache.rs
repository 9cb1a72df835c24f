//! Process-wide single-slot key cache.
//!
//! The in-process cache is the source of truth and is always present: it
//! holds the master key derived at unlock time alongside the storage id it
//! was derived for, so a later operation can detect that the loaded
//! envelope no longer matches the key that's cached (identity mismatch) and
//! wipe the slot.
//!
//! An optional [`KeyringMirror`] lets a host application additionally
//! persist the key to the OS credential store, matching the original's use
//! of `go-keyring`. It is not wired up automatically -- a headless library
//! has no business assuming a desktop keychain exists -- but a ready-made
//! [`OsKeyringMirror`] is provided for hosts that want it.

use std::sync::{Mutex, OnceLock};

use zeroize::ZeroizeOnDrop;

use crate::config::{KEYRING_ACCOUNT, KEYRING_SERVICE};
use crate::error::{ImcryptError, Result};

#[derive(Debug, Clone, ZeroizeOnDrop)]
pub struct CachedKey {
    #[zeroize(skip)]
    pub storage_id: String,
    pub key: Vec<u8>,
}

fn slot() -> &'static Mutex<Option<CachedKey>> {
    static SLOT: OnceLock<Mutex<Option<CachedKey>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Stores `key` for `storage_id`, replacing whatever was cached before.
pub fn set(storage_id: impl Into<String>, key: Vec<u8>) {
    let mut guard = slot().lock().expect("key cache mutex poisoned");
    *guard = Some(CachedKey {
        storage_id: storage_id.into(),
        key,
    });
}

/// Returns the cached key if one is present.
pub fn get() -> Result<CachedKey> {
    let guard = slot().lock().expect("key cache mutex poisoned");
    guard.clone().ok_or(ImcryptError::KeyNotFound)
}

/// Clears the cache slot.
pub fn delete() {
    let mut guard = slot().lock().expect("key cache mutex poisoned");
    *guard = None;
}

/// Serializes access to the process-wide cache slot across tests (both this
/// crate's own unit tests and external integration tests). The default test
/// harness runs `#[test]` functions in parallel within a binary, and every
/// caller shares this one global slot, so any test that exercises the cache
/// should hold this guard for its duration. Not useful outside of tests.
pub fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    TEST_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns the cached key only if its `storage_id` matches `expected`;
/// otherwise clears the cache and returns [`ImcryptError::IdentityMismatch`],
/// matching the original's "wipe on mismatch" behavior.
pub fn get_for_storage(expected: &str) -> Result<CachedKey> {
    let cached = get()?;
    if cached.storage_id != expected {
        delete();
        return Err(ImcryptError::IdentityMismatch);
    }
    Ok(cached)
}

/// Abstraction over an OS credential store used to persist the master key
/// outside of process memory.
pub trait KeyringMirror: Send + Sync {
    fn set(&self, storage_id: &str, key: &[u8]) -> Result<()>;
    fn get(&self) -> Result<CachedKey>;
    fn delete(&self) -> Result<()>;
}

/// A mirror that does nothing; the default when no OS credential store
/// integration is desired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMirror;

impl KeyringMirror for NullMirror {
    fn set(&self, _storage_id: &str, _key: &[u8]) -> Result<()> {
        Ok(())
    }

    fn get(&self) -> Result<CachedKey> {
        Err(ImcryptError::KeyNotFound)
    }

    fn delete(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct KeyringData {
    id: String,
    key: Vec<u8>,
    created: u64,
}

/// A [`KeyringMirror`] backed by the `keyring` crate, storing a JSON-encoded
/// `{id, key, created}` record under service `"Imcrypt"`, account `"key"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsKeyringMirror;

impl OsKeyringMirror {
    fn entry() -> std::result::Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
    }
}

impl KeyringMirror for OsKeyringMirror {
    fn set(&self, storage_id: &str, key: &[u8]) -> Result<()> {
        // Matches the original's "delete first, then set" sequencing.
        let _ = self.delete();

        let entry = Self::entry().map_err(|e| ImcryptError::Keyring(e.to_string()))?;
        let data = KeyringData {
            id: storage_id.to_string(),
            key: key.to_vec(),
            created: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        };
        let json = serde_json::to_string(&data)
            .map_err(|e| ImcryptError::Keyring(e.to_string()))?;
        entry
            .set_password(&json)
            .map_err(|e| ImcryptError::Keyring(e.to_string()))
    }

    fn get(&self) -> Result<CachedKey> {
        let entry = Self::entry().map_err(|_| ImcryptError::KeyNotFound)?;
        let json = entry.get_password().map_err(|_| ImcryptError::KeyNotFound)?;
        let data: KeyringData =
            serde_json::from_str(&json).map_err(|_| ImcryptError::KeyNotFound)?;
        Ok(CachedKey {
            storage_id: data.id,
            key: data.key,
        })
    }

    fn delete(&self) -> Result<()> {
        // Best-effort: a missing entry is not an error here, matching the
        // original's discarded-error `key.Delete()` (see DESIGN.md).
        if let Ok(entry) = Self::entry() {
            let _ = entry.delete_password();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These share one process-wide slot, so they run as a single test rather
    // than separate #[test] functions to avoid the default parallel test
    // runner racing on global state.
    #[test]
    fn cache_lifecycle() {
        let _guard = test_lock();
        delete();
        assert!(matches!(get(), Err(ImcryptError::KeyNotFound)));

        set("storage-1", vec![1, 2, 3]);
        let cached = get().unwrap();
        assert_eq!(cached.storage_id, "storage-1");
        assert_eq!(cached.key, vec![1, 2, 3]);

        let result = get_for_storage("storage-2");
        assert!(matches!(result, Err(ImcryptError::IdentityMismatch)));
        assert!(matches!(get(), Err(ImcryptError::KeyNotFound)));

        set("storage-1", vec![4, 5, 6]);
        assert_eq!(get_for_storage("storage-1").unwrap().key, vec![4, 5, 6]);
        delete();
    }
}
