//! Master key lifecycle — setup, unlock, lock, rotate.
//!
//! The manager is a three-state machine over the storage collaborator:
//!
//! ```text
//! Uninitialized --setup--> Locked <--lock/unlock--> Unlocked
//! ```
//!
//! Unlocking yields a [`VaultSession`] owning the derived key; the session
//! is the only place a live key ever exists, and dropping it (via
//! [`MasterKeyManager::lock`] or scope exit) zeroizes the key on every path.
//! What persists is a [`MasterKeyRecord`]: salt, iteration count, and a
//! one-way verifier — never the password, never the key.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use cadenas_crypto_core::envelope;
use cadenas_crypto_core::kdf::{self, Pbkdf2Params};
use cadenas_crypto_core::memory::{KeyMaterial, SecretBuffer};
use cadenas_crypto_core::strength;

use crate::error::VaultError;
use crate::storage::VaultStore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Salt length in bytes for master key derivation.
pub const SALT_LEN: usize = 16;

/// Minimum strength score a master password must clear.
pub const MIN_MASTER_SCORE: u8 = 60;

/// Current master key record version.
pub const RECORD_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Records and session
// ---------------------------------------------------------------------------

/// Persisted master key metadata — one per vault, replaced wholesale on
/// rotation or recovery reset.
///
/// `verifier_hash` is `BLAKE3(derived_key)`: enough to check a password by
/// re-deriving, useless for decrypting anything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterKeyRecord {
    /// Random 16-byte KDF salt. Not secret.
    pub salt: Vec<u8>,
    /// PBKDF2 iteration count used when this record was created.
    pub iterations: u32,
    /// One-way verifier over the derived key.
    pub verifier_hash: Vec<u8>,
    /// Record format version.
    pub version: u8,
}

/// Vault lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VaultStatus {
    /// No master key record exists yet.
    Uninitialized,
    /// A record exists but no session key is live.
    Locked,
    /// A session key is live.
    Unlocked,
}

/// A live unlocked session. Owns the derived key; dropped on lock.
pub struct VaultSession {
    key: KeyMaterial,
}

impl VaultSession {
    /// The session key, for sealing/opening envelopes.
    #[must_use]
    pub const fn key(&self) -> &KeyMaterial {
        &self.key
    }
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultSession(***)")
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns the vault lock/unlock/rotate lifecycle over a storage collaborator.
pub struct MasterKeyManager<S: VaultStore> {
    store: S,
    params: Pbkdf2Params,
    session: Option<VaultSession>,
}

impl<S: VaultStore> MasterKeyManager<S> {
    /// Create a manager with the default derivation cost (100k iterations).
    pub fn new(store: S) -> Self {
        Self::with_params(store, Pbkdf2Params::default())
    }

    /// Create a manager with explicit derivation parameters.
    ///
    /// The parameters apply to records created by `setup`/`rotate`/reset;
    /// verification always uses the iteration count stored in the record.
    pub fn with_params(store: S, params: Pbkdf2Params) -> Self {
        Self {
            store,
            params,
            session: None,
        }
    }

    /// Current lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Storage` if the record cannot be read.
    pub fn status(&self) -> Result<VaultStatus, VaultError> {
        if self.session.is_some() {
            return Ok(VaultStatus::Unlocked);
        }
        Ok(if self.store.load_master_record()?.is_some() {
            VaultStatus::Locked
        } else {
            VaultStatus::Uninitialized
        })
    }

    /// The live session, if unlocked.
    #[must_use]
    pub const fn session(&self) -> Option<&VaultSession> {
        self.session.as_ref()
    }

    /// Initialize the vault with a master password: `Uninitialized → Locked`.
    ///
    /// The derived key is used only to compute the verifier and is discarded
    /// before returning — setting up does not unlock.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyInitialized`] if a record already exists
    /// - [`VaultError::WeakPassword`] if the password scores below
    ///   [`MIN_MASTER_SCORE`]
    pub fn setup(&mut self, password: &str) -> Result<(), VaultError> {
        if self.store.load_master_record()?.is_some() {
            return Err(VaultError::AlreadyInitialized);
        }
        require_strong_password(password)?;

        let (record, _key) = self.create_record(password)?;
        self.store.store_master_record(&record)?;
        tracing::info!("vault initialized");
        Ok(())
    }

    /// Verify the master password and open a session: `Locked → Unlocked`.
    ///
    /// Re-derives the key from the stored salt and compares the verifier in
    /// constant time. On failure the state is unchanged.
    ///
    /// There is deliberately no built-in attempt counter here — verification
    /// is side-effect-free so it can double as a re-authentication gate;
    /// interactive callers apply their own backoff.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Uninitialized`] if no record exists
    /// - [`VaultError::InvalidCredentials`] if the password is wrong
    pub fn unlock(&mut self, password: &str) -> Result<&VaultSession, VaultError> {
        let record = self.require_record()?;
        let key = verify_against_record(password.as_bytes(), &record)?;
        self.session = Some(VaultSession { key });
        tracing::info!("vault unlocked");
        // Session was just set.
        self.session.as_ref().ok_or(VaultError::Locked)
    }

    /// Drop the session key: `Unlocked → Locked`. A no-op when locked.
    pub fn lock(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("vault locked");
        }
    }

    /// Replace the master password and re-seal every stored envelope under
    /// the new key, atomically.
    ///
    /// All envelopes are opened under the old key and re-sealed under the
    /// new key in memory first; only then does a single
    /// [`VaultStore::commit_rotation`] persist the new record together with
    /// the new envelope set. Any failure — a wrong old password, a weak new
    /// password, one undecryptable envelope — aborts with the store exactly
    /// as it was. An unlocked vault stays unlocked (now holding the new
    /// key); a locked vault stays locked.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Uninitialized`] if no record exists
    /// - [`VaultError::InvalidCredentials`] if `old_password` is wrong
    /// - [`VaultError::WeakPassword`] if `new_password` is too weak
    /// - [`VaultError::Crypto`] if any envelope fails to open or re-seal
    pub fn rotate(&mut self, old_password: &str, new_password: &str) -> Result<(), VaultError> {
        let record = self.require_record()?;
        let old_key = verify_against_record(old_password.as_bytes(), &record)?;
        require_strong_password(new_password)?;

        let (new_record, new_key) = self.create_record(new_password)?;

        // Re-seal everything in memory before touching storage.
        let mut resealed = Vec::new();
        for (connection_id, sealed) in self.store.list_envelopes()? {
            let plaintext = envelope::open(&sealed, old_key.expose())?;
            resealed.push((
                connection_id,
                envelope::seal(plaintext.expose(), new_key.expose())?,
            ));
        }

        self.store.commit_rotation(&new_record, &resealed)?;

        if self.session.is_some() {
            self.session = Some(VaultSession { key: new_key });
        }
        tracing::info!(envelopes = resealed.len(), "master key rotated");
        Ok(())
    }

    // -- Sealed secret access (requires a live session) --

    /// Seal `plaintext` under the session key and persist it for
    /// `connection_id`, replacing any previous envelope.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] without touching storage when no
    /// session key exists — secrets are never stored unencrypted.
    pub fn store_secret(
        &mut self,
        connection_id: &str,
        plaintext: &[u8],
    ) -> Result<(), VaultError> {
        let session = self.session.as_ref().ok_or(VaultError::Locked)?;
        let sealed = envelope::seal(plaintext, session.key().expose())?;
        self.store.put_envelope(connection_id, &sealed)
    }

    /// Open the secret stored for `connection_id`, if any.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Locked`] if no session key exists
    /// - [`VaultError::Crypto`] on integrity/format/version failures
    pub fn load_secret(&self, connection_id: &str) -> Result<Option<SecretBuffer>, VaultError> {
        let session = self.session.as_ref().ok_or(VaultError::Locked)?;
        match self.store.load_envelope(connection_id)? {
            Some(sealed) => Ok(Some(envelope::open(&sealed, session.key().expose())?)),
            None => Ok(None),
        }
    }

    /// Delete the secret stored for `connection_id` (when the owning
    /// connection record is deleted). Works locked or unlocked — removal
    /// needs no key.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Storage` if the collaborator fails.
    pub fn delete_secret(&mut self, connection_id: &str) -> Result<(), VaultError> {
        self.store.delete_envelope(connection_id)
    }

    // -- Crate-internal plumbing for the recovery module --

    pub(crate) fn store_ref(&self) -> &S {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub(crate) fn create_record(
        &self,
        password: &str,
    ) -> Result<(MasterKeyRecord, KeyMaterial), VaultError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let derived = kdf::derive(password.as_bytes(), &salt, &self.params)?;
        let key = KeyMaterial::from_buffer(&derived)?;
        let verifier = blake3::hash(key.expose());

        Ok((
            MasterKeyRecord {
                salt: salt.to_vec(),
                iterations: self.params.iterations,
                verifier_hash: verifier.as_bytes().to_vec(),
                version: RECORD_VERSION,
            },
            key,
        ))
    }

    pub(crate) fn require_record(&self) -> Result<MasterKeyRecord, VaultError> {
        self.store
            .load_master_record()?
            .ok_or(VaultError::Uninitialized)
    }

    pub(crate) fn drop_session(&mut self) {
        self.session = None;
    }
}

// ---------------------------------------------------------------------------
// Verification helpers
// ---------------------------------------------------------------------------

/// Re-derive from the record's salt and compare verifiers in constant time.
fn verify_against_record(
    password: &[u8],
    record: &MasterKeyRecord,
) -> Result<KeyMaterial, VaultError> {
    let params = Pbkdf2Params {
        iterations: record.iterations,
        key_len: cadenas_crypto_core::KEY_LEN,
    };
    let derived = kdf::derive(password, &record.salt, &params)?;
    let key = KeyMaterial::from_buffer(&derived)?;
    let verifier = blake3::hash(key.expose());

    if ring::constant_time::verify_slices_are_equal(verifier.as_bytes(), &record.verifier_hash)
        .is_err()
    {
        tracing::warn!("master password verification failed");
        return Err(VaultError::InvalidCredentials);
    }
    Ok(key)
}

pub(crate) fn require_strong_password(password: &str) -> Result<(), VaultError> {
    let report = strength::score(password);
    if report.score < MIN_MASTER_SCORE {
        return Err(VaultError::WeakPassword {
            score: report.score,
            required: MIN_MASTER_SCORE,
            feedback: report.feedback,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
