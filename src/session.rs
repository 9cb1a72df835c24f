//! The session controller: the `NoFile -> FileLoaded -> Unlocked -> Locked`
//! state machine, inactivity timeout, background write dispatch, and the
//! event channel a host polls for out-of-band notifications.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::ImageFormat;
use tracing::{error, info};

use crate::config::SALT_LEN;
use crate::crypto;
use crate::envelope::Storage;
use crate::error::{ImcryptError, Result};
use crate::generate;
use crate::id;
use crate::keycache::{self, KeyringMirror, NullMirror};
use crate::model::{
    Database, Group, GroupUpdate, Item, ItemUpdate, Ruleset, SettingsUpdate,
};
use crate::stego;
use crate::totp::{self, Enrollment};
use crate::validate::{self, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoFile,
    FileLoaded,
    Unlocked,
    Locked,
}

/// An out-of-band notification a host should poll for: the inactivity
/// timer firing, or a background disk write failing.
#[derive(Debug, Clone)]
pub enum Event {
    AuthExpired,
    StorageWriteFailed(String),
}

struct WriteJob {
    path: PathBuf,
    format: ImageFormat,
    payload: Vec<u8>,
}

/// Owns a background thread that coalesces writes: a burst of mutations
/// collapses to a single write of the latest snapshot, and failures are
/// reported on `event_tx` rather than dropped.
///
/// `pending` tracks how many dispatched jobs have not yet been picked up and
/// written (coalescing means this can drop by more than one per write). It
/// exists for [`Session::flush`], which a host -- or this crate's own tests,
/// which read the carrier file back from disk right after mutating it --
/// can call to wait for the agent to catch up.
struct WriteAgent {
    tx: Sender<WriteJob>,
    pending: Arc<(Mutex<usize>, Condvar)>,
}

impl WriteAgent {
    fn spawn(event_tx: Sender<Event>) -> Self {
        let (tx, rx): (Sender<WriteJob>, Receiver<WriteJob>) = mpsc::channel();
        let pending = Arc::new((Mutex::new(0usize), Condvar::new()));
        let worker_pending = Arc::clone(&pending);

        thread::spawn(move || {
            while let Ok(mut job) = rx.recv() {
                let mut drained = 1usize;
                // Drain any further jobs queued up behind this one so a
                // burst of mutations collapses to the latest snapshot.
                while let Ok(newer) = rx.try_recv() {
                    job = newer;
                    drained += 1;
                }

                if let Err(e) = write_carrier(&job.path, job.format, &job.payload) {
                    error!(error = %e, "background storage write failed");
                    let _ = event_tx.send(Event::StorageWriteFailed(e.to_string()));
                }

                let (lock, cvar) = &*worker_pending;
                let mut count = lock.lock().expect("write agent pending mutex poisoned");
                *count = count.saturating_sub(drained);
                if *count == 0 {
                    cvar.notify_all();
                }
            }
        });

        WriteAgent { tx, pending }
    }

    fn dispatch(&self, path: PathBuf, format: ImageFormat, payload: Vec<u8>) {
        {
            let (lock, _) = &*self.pending;
            let mut count = lock.lock().expect("write agent pending mutex poisoned");
            *count += 1;
        }
        let _ = self.tx.send(WriteJob { path, format, payload });
    }

    /// Blocks until every dispatched write has been picked up and written.
    fn flush(&self) {
        let (lock, cvar) = &*self.pending;
        let guard = lock.lock().expect("write agent pending mutex poisoned");
        let _unused = cvar
            .wait_while(guard, |count| *count > 0)
            .expect("write agent pending mutex poisoned");
    }
}

fn write_carrier(path: &Path, format: ImageFormat, payload: &[u8]) -> Result<()> {
    let existing = std::fs::read(path)?;
    let (carrier, _) = stego::decode_carrier(&existing)?;
    let encoded = stego::encode(&carrier, format, payload)?;
    std::fs::write(path, encoded)?;
    Ok(())
}

/// The session controller. Owns the loaded carrier path, the decrypted
/// in-memory database once unlocked, and the background write agent.
pub struct Session {
    state: SessionState,
    carrier_path: Option<PathBuf>,
    carrier_format: Option<ImageFormat>,
    storage: Option<Storage>,
    database: Option<Database>,
    account_name: String,
    unlock_deadline: Option<Instant>,
    write_agent: WriteAgent,
    event_rx: Receiver<Event>,
    mirror: Box<dyn KeyringMirror>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_mirror(Box::new(NullMirror))
    }

    pub fn with_mirror(mirror: Box<dyn KeyringMirror>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Session {
            state: SessionState::NoFile,
            carrier_path: None,
            carrier_format: None,
            storage: None,
            database: None,
            account_name: String::new(),
            unlock_deadline: None,
            write_agent: WriteAgent::spawn(event_tx),
            event_rx,
            mirror,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drains and returns any pending out-of-band events.
    pub fn poll_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Blocks until every background-dispatched write triggered by a prior
    /// mutation has landed on disk. Mutations are fire-and-forget by design;
    /// this is for a host (or test) that needs a hard guarantee the carrier
    /// file reflects the latest commit before reading it back independently.
    pub fn flush(&self) {
        self.write_agent.flush();
    }

    /// Returns true if the inactivity deadline has passed, firing
    /// `lock()`'s effective state transition. A host is expected to poll
    /// this periodically (the original polls every 10 seconds); it does
    /// not spawn its own timer thread.
    pub fn check_inactivity(&mut self) -> bool {
        if let Some(deadline) = self.unlock_deadline {
            if Instant::now() >= deadline {
                self.lock();
                return true;
            }
        }
        false
    }

    fn account_name_from_path(path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("imcrypt")
            .to_string()
    }

    /// Loads a PNG/JPEG carrier, detecting whether it already holds a
    /// storage envelope.
    pub fn load_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let bytes = std::fs::read(&path)?;
        let (_, format) = stego::decode_carrier(&bytes)?;

        self.account_name = Self::account_name_from_path(&path);
        self.carrier_path = Some(path);
        self.carrier_format = Some(format);
        self.storage = None;
        self.database = None;
        self.state = SessionState::FileLoaded;
        Ok(())
    }

    /// Returns whether the loaded carrier already holds a parseable
    /// storage envelope.
    pub fn has_storage(&self) -> Result<bool> {
        let path = self.carrier_path.as_ref().ok_or(ImcryptError::NoStorageLoaded)?;
        let bytes = std::fs::read(path)?;
        let (carrier, _) = stego::decode_carrier(&bytes)?;
        match stego::decode(&carrier) {
            Ok(payload) => Ok(crate::serialize::deserialize::<Storage>(&payload).is_ok()),
            Err(_) => Ok(false),
        }
    }

    fn read_storage(&self) -> Result<Storage> {
        let path = self.carrier_path.as_ref().ok_or(ImcryptError::NoStorageLoaded)?;
        let bytes = std::fs::read(path)?;
        let (carrier, _) = stego::decode_carrier(&bytes)?;
        let payload = stego::decode(&carrier)?;
        crate::serialize::deserialize(&payload)
    }

    /// Initializes a brand-new vault on the already-loaded carrier: derives
    /// a master key from `password`, builds an empty database, and writes
    /// the resulting envelope to the carrier image.
    pub fn initialize_storage(&mut self, password: &str) -> Result<()> {
        if self.state != SessionState::FileLoaded {
            return Err(ImcryptError::InvalidSessionState);
        }
        if password.is_empty() {
            return Err(ImcryptError::ValidationFailed(
                "password must not be empty".into(),
            ));
        }

        let password_salt = crypto::generate_salt(SALT_LEN);
        let encryption_salt = crypto::generate_salt(SALT_LEN);
        let password_hash = crypto::hash(password.as_bytes(), &password_salt);

        let storage_id = id::generate_storage_id();
        let mut storage = Storage::new(storage_id.clone(), encryption_salt, password_salt);

        keycache::set(storage_id.clone(), password_hash.to_vec());
        let _ = self.mirror.set(&storage_id, &password_hash);

        let database = Database::new();
        storage.set_database(&database)?;

        // Unlike the mutation operations below, initializing a brand-new
        // vault writes synchronously: there is no prior on-disk state for a
        // background write to race against returning success to the caller.
        let path = self.carrier_path.clone().ok_or(ImcryptError::NoStorageLoaded)?;
        let format = self.carrier_format.ok_or(ImcryptError::NoStorageLoaded)?;
        let payload = crate::serialize::serialize(&storage)?;
        write_carrier(&path, format, &payload)?;

        self.database = Some(database);
        self.storage = Some(storage);
        self.unlock_deadline =
            Some(Instant::now() + Duration::from_millis(crate::config::DEFAULT_SESSION_LENGTH_MS));
        self.state = SessionState::Unlocked;
        info!(storage_id = %storage_id, "initialized new storage");
        Ok(())
    }

    /// Unlocks the vault with `password`, verifying it by successfully
    /// decrypting and HMAC-validating the stored database. Runs the
    /// half-enrollment two-factor sweep on success.
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        if self.state != SessionState::FileLoaded && self.state != SessionState::Locked {
            return Err(ImcryptError::InvalidSessionState);
        }

        let mut storage = self.read_storage()?;
        let password_hash = crypto::hash(password.as_bytes(), &storage.password_salt);

        keycache::set(storage.id.clone(), password_hash.to_vec());
        let _ = self.mirror.set(&storage.id, &password_hash);

        let database = match storage.get_database() {
            Ok(db) => db,
            Err(e) => {
                keycache::delete();
                return Err(e);
            }
        };

        self.unlock_deadline = Some(
            Instant::now() + Duration::from_millis(database.settings.session_length_ms),
        );

        if storage.sweep_unconfirmed_two_factor() {
            storage.set_database(&database)?;
            self.write_storage(&storage)?;
        }

        self.database = Some(database);
        self.storage = Some(storage);
        self.state = SessionState::Unlocked;
        Ok(())
    }

    /// Locks the session, clearing the cached key and in-memory database
    /// but keeping the carrier path loaded.
    pub fn lock(&mut self) {
        keycache::delete();
        let _ = self.mirror.delete();
        self.database = None;
        self.unlock_deadline = None;
        self.state = SessionState::Locked;
    }

    /// Closes the session entirely, releasing the loaded carrier.
    pub fn close_session(&mut self) {
        keycache::delete();
        let _ = self.mirror.delete();
        self.carrier_path = None;
        self.carrier_format = None;
        self.storage = None;
        self.database = None;
        self.unlock_deadline = None;
        self.state = SessionState::NoFile;
    }

    /// Returns whether the cached key's storage id still matches the
    /// currently loaded storage, treating `KeyNotFound`/`KeyExpired` as
    /// "not authenticated" rather than surfacing them as errors.
    pub fn is_authenticated(&self) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };
        match keycache::get_for_storage(&storage.id) {
            Ok(_) => true,
            Err(ImcryptError::KeyNotFound) | Err(ImcryptError::KeyExpired) => false,
            Err(ImcryptError::IdentityMismatch) => false,
            Err(_) => false,
        }
    }

    fn require_unlocked(&self) -> Result<()> {
        if self.state != SessionState::Unlocked {
            return Err(ImcryptError::Locked);
        }
        Ok(())
    }

    fn write_storage(&self, storage: &Storage) -> Result<()> {
        let path = self.carrier_path.clone().ok_or(ImcryptError::NoStorageLoaded)?;
        let format = self.carrier_format.ok_or(ImcryptError::NoStorageLoaded)?;
        let payload = crate::serialize::serialize(storage)?;
        self.write_agent.dispatch(path, format, payload);
        Ok(())
    }

    /// Commits the in-memory database: re-encrypts it into `self.storage`
    /// and dispatches a background write, returning immediately with the
    /// in-memory database already updated.
    fn commit(&mut self) -> Result<()> {
        let database = self.database.as_ref().ok_or(ImcryptError::NoStorageLoaded)?;
        let storage = self.storage.as_mut().ok_or(ImcryptError::NoStorageLoaded)?;
        storage.set_database(database)?;
        self.write_storage(storage)
    }

    pub fn get_database(&self) -> Result<(&Database, bool)> {
        self.require_unlocked()?;
        let database = self.database.as_ref().expect("unlocked implies database present");
        let storage = self.storage.as_ref().expect("unlocked implies storage present");
        Ok((database, storage.two_factor_secret.is_some()))
    }

    pub fn insert_items(&mut self, items: Vec<(Item, Vec<String>)>) -> Result<Vec<String>> {
        self.require_unlocked()?;
        let ids = self
            .database
            .as_mut()
            .expect("unlocked implies database present")
            .insert_items(items)?;
        self.commit()?;
        Ok(ids)
    }

    pub fn insert_groups(&mut self, groups: Vec<Group>) -> Result<Vec<String>> {
        self.require_unlocked()?;
        let ids = self
            .database
            .as_mut()
            .expect("unlocked implies database present")
            .insert_groups(groups)?;
        self.commit()?;
        Ok(ids)
    }

    pub fn update_items_by_id(&mut self, updates: Vec<ItemUpdate>) -> Result<()> {
        self.require_unlocked()?;
        self.database
            .as_mut()
            .expect("unlocked implies database present")
            .update_items_by_id(updates)?;
        self.commit()
    }

    pub fn update_groups_by_id(&mut self, updates: Vec<GroupUpdate>) -> Result<()> {
        self.require_unlocked()?;
        self.database
            .as_mut()
            .expect("unlocked implies database present")
            .update_groups_by_id(updates)?;
        self.commit()
    }

    pub fn delete_items_by_id(&mut self, ids: &[String]) -> Result<()> {
        self.require_unlocked()?;
        self.database
            .as_mut()
            .expect("unlocked implies database present")
            .delete_items_by_id(ids);
        self.commit()
    }

    pub fn delete_groups_by_id(&mut self, ids: &[String]) -> Result<()> {
        self.require_unlocked()?;
        self.database
            .as_mut()
            .expect("unlocked implies database present")
            .delete_groups_by_id(ids);
        self.commit()
    }

    pub fn update_settings(&mut self, update: &SettingsUpdate) -> Result<()> {
        self.require_unlocked()?;
        self.database
            .as_mut()
            .expect("unlocked implies database present")
            .update_settings(update);
        self.commit()
    }

    pub fn generate_password(
        &self,
        ruleset: &Ruleset,
        previous_passwords: &[String],
    ) -> Result<String> {
        self.require_unlocked()?;
        generate::generate(ruleset, previous_passwords)
    }

    pub fn validate_password(
        &self,
        password: &str,
        ruleset: &Ruleset,
        previous_passwords: &[String],
    ) -> Result<ValidationReport> {
        self.require_unlocked()?;
        Ok(validate::validate_password(password, ruleset, previous_passwords))
    }

    // -- Two-factor authentication (vault-wide) --------------------------------

    pub fn generate_two_factor_secret(&mut self) -> Result<Enrollment> {
        self.require_unlocked()?;
        let enrollment = totp::generate_secret(&self.account_name)?;
        let (recovery_hash, recovery_salt) = totp::hash_recovery_code(&enrollment.recovery_code);

        let storage = self.storage.as_mut().expect("unlocked implies storage present");
        storage.two_factor_secret = Some(enrollment.secret_base32.clone());
        storage.two_factor_recovery_hash = Some(recovery_hash);
        storage.two_factor_recovery_salt = Some(recovery_salt);
        storage.two_factor_confirmed = false;

        self.commit()?;
        Ok(enrollment)
    }

    pub fn delete_two_factor_secret(&mut self) -> Result<()> {
        self.require_unlocked()?;
        self.storage
            .as_mut()
            .expect("unlocked implies storage present")
            .delete_two_factor_secret();
        self.commit()
    }

    pub fn has_two_factor_authentication(&self) -> Result<bool> {
        self.require_unlocked()?;
        Ok(self
            .storage
            .as_ref()
            .expect("unlocked implies storage present")
            .has_two_factor_authentication())
    }

    pub fn validate_two_factor_code(&mut self, code: &str, should_confirm: bool) -> Result<bool> {
        self.require_unlocked()?;
        let secret = self
            .storage
            .as_ref()
            .and_then(|s| s.two_factor_secret.clone())
            .ok_or(ImcryptError::TwoFactorNotEnrolled)?;

        let valid = totp::validate_code(&secret, &self.account_name, code)?;

        if valid && should_confirm {
            self.storage
                .as_mut()
                .expect("unlocked implies storage present")
                .two_factor_confirmed = true;
            self.commit()?;
        }

        Ok(valid)
    }

    pub fn validate_two_factor_recovery_code(&self, code: &str) -> Result<bool> {
        self.require_unlocked()?;
        let storage = self.storage.as_ref().expect("unlocked implies storage present");
        let (hash, salt) = match (&storage.two_factor_recovery_hash, &storage.two_factor_recovery_salt) {
            (Some(h), Some(s)) => (h, s),
            _ => return Err(ImcryptError::TwoFactorNotEnrolled),
        };
        Ok(totp::validate_recovery_code(code, hash, salt))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
