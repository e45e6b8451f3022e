//! Storage collaborator seam.
//!
//! The core never does its own persistence: everything it needs to keep —
//! the master key record, the envelope per connection, the recovery code
//! set — goes through [`VaultStore`]. Two implementations ship with the
//! crate:
//! - [`MemoryStore`] — plain maps, for tests and embedding
//! - [`JsonFileStore`] — one JSON document on disk, updated atomically via
//!   write-to-temp-then-rename so a crash never leaves a half-written vault
//!
//! Rotation and recovery reset replace the record and the whole envelope set
//! in a single [`VaultStore::commit_rotation`] call; an implementation must
//! make that replacement all-or-nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::master_key::MasterKeyRecord;
use crate::recovery::RecoveryCode;
use cadenas_crypto_core::VaultSecretEnvelope;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Persistence collaborator for the vault core.
///
/// Envelopes are keyed by the owning connection record's identifier.
pub trait VaultStore {
    /// Load the master key record, if the vault has been set up.
    fn load_master_record(&self) -> Result<Option<MasterKeyRecord>, VaultError>;

    /// Store (or replace) the master key record.
    fn store_master_record(&mut self, record: &MasterKeyRecord) -> Result<(), VaultError>;

    /// Load the envelope for one connection.
    fn load_envelope(&self, connection_id: &str)
        -> Result<Option<VaultSecretEnvelope>, VaultError>;

    /// Store (or replace) the envelope for one connection.
    fn put_envelope(
        &mut self,
        connection_id: &str,
        envelope: &VaultSecretEnvelope,
    ) -> Result<(), VaultError>;

    /// Delete the envelope for one connection. Deleting a missing envelope
    /// is not an error.
    fn delete_envelope(&mut self, connection_id: &str) -> Result<(), VaultError>;

    /// List every stored envelope with its connection id, in a stable order.
    fn list_envelopes(&self) -> Result<Vec<(String, VaultSecretEnvelope)>, VaultError>;

    /// Load the recovery code set (empty if none was ever generated).
    fn load_recovery_codes(&self) -> Result<Vec<RecoveryCode>, VaultError>;

    /// Replace the recovery code set.
    fn store_recovery_codes(&mut self, codes: &[RecoveryCode]) -> Result<(), VaultError>;

    /// Atomically replace the master key record and the entire envelope set.
    ///
    /// Either everything lands or nothing does — no reader may ever observe
    /// the new record next to old envelopes or vice versa.
    fn commit_rotation(
        &mut self,
        record: &MasterKeyRecord,
        envelopes: &[(String, VaultSecretEnvelope)],
    ) -> Result<(), VaultError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store — the natural collaborator for tests and for hosts that
/// do their own persistence of the serialized records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    master: Option<MasterKeyRecord>,
    envelopes: BTreeMap<String, VaultSecretEnvelope>,
    recovery_codes: Vec<RecoveryCode>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VaultStore for MemoryStore {
    fn load_master_record(&self) -> Result<Option<MasterKeyRecord>, VaultError> {
        Ok(self.master.clone())
    }

    fn store_master_record(&mut self, record: &MasterKeyRecord) -> Result<(), VaultError> {
        self.master = Some(record.clone());
        Ok(())
    }

    fn load_envelope(
        &self,
        connection_id: &str,
    ) -> Result<Option<VaultSecretEnvelope>, VaultError> {
        Ok(self.envelopes.get(connection_id).cloned())
    }

    fn put_envelope(
        &mut self,
        connection_id: &str,
        envelope: &VaultSecretEnvelope,
    ) -> Result<(), VaultError> {
        self.envelopes
            .insert(connection_id.to_string(), envelope.clone());
        Ok(())
    }

    fn delete_envelope(&mut self, connection_id: &str) -> Result<(), VaultError> {
        self.envelopes.remove(connection_id);
        Ok(())
    }

    fn list_envelopes(&self) -> Result<Vec<(String, VaultSecretEnvelope)>, VaultError> {
        Ok(self
            .envelopes
            .iter()
            .map(|(id, env)| (id.clone(), env.clone()))
            .collect())
    }

    fn load_recovery_codes(&self) -> Result<Vec<RecoveryCode>, VaultError> {
        Ok(self.recovery_codes.clone())
    }

    fn store_recovery_codes(&mut self, codes: &[RecoveryCode]) -> Result<(), VaultError> {
        self.recovery_codes = codes.to_vec();
        Ok(())
    }

    fn commit_rotation(
        &mut self,
        record: &MasterKeyRecord,
        envelopes: &[(String, VaultSecretEnvelope)],
    ) -> Result<(), VaultError> {
        self.master = Some(record.clone());
        self.envelopes = envelopes
            .iter()
            .map(|(id, env)| (id.clone(), env.clone()))
            .collect();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Serialized form of the whole vault state — one JSON document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct VaultDocument {
    master: Option<MasterKeyRecord>,
    #[serde(default)]
    envelopes: BTreeMap<String, VaultSecretEnvelope>,
    #[serde(default)]
    recovery_codes: Vec<RecoveryCode>,
}

/// File-backed store keeping the vault state in a single JSON document.
///
/// Every mutation rewrites the document through a temp file followed by a
/// rename, so the on-disk state is always either the old document or the
/// new one, never a truncated mix. All stored values are already encrypted
/// or one-way hashed; the file itself carries no secrets.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    doc: VaultDocument,
}

impl JsonFileStore {
    /// Open the store at `path`, reading the existing document if present.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Storage` if the file exists but cannot be read
    /// or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        let doc = if path.exists() {
            let data = std::fs::read(&path)
                .map_err(|e| VaultError::Storage(format!("cannot read {}: {e}", path.display())))?;
            serde_json::from_slice(&data).map_err(|e| {
                VaultError::Storage(format!("corrupt vault document {}: {e}", path.display()))
            })?
        } else {
            VaultDocument::default()
        };
        Ok(Self { path, doc })
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), VaultError> {
        let data = serde_json::to_vec_pretty(&self.doc)
            .map_err(|e| VaultError::Storage(format!("cannot serialize vault document: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data)
            .map_err(|e| VaultError::Storage(format!("cannot write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            VaultError::Storage(format!("cannot replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

impl VaultStore for JsonFileStore {
    fn load_master_record(&self) -> Result<Option<MasterKeyRecord>, VaultError> {
        Ok(self.doc.master.clone())
    }

    fn store_master_record(&mut self, record: &MasterKeyRecord) -> Result<(), VaultError> {
        self.doc.master = Some(record.clone());
        self.persist()
    }

    fn load_envelope(
        &self,
        connection_id: &str,
    ) -> Result<Option<VaultSecretEnvelope>, VaultError> {
        Ok(self.doc.envelopes.get(connection_id).cloned())
    }

    fn put_envelope(
        &mut self,
        connection_id: &str,
        envelope: &VaultSecretEnvelope,
    ) -> Result<(), VaultError> {
        self.doc
            .envelopes
            .insert(connection_id.to_string(), envelope.clone());
        self.persist()
    }

    fn delete_envelope(&mut self, connection_id: &str) -> Result<(), VaultError> {
        self.doc.envelopes.remove(connection_id);
        self.persist()
    }

    fn list_envelopes(&self) -> Result<Vec<(String, VaultSecretEnvelope)>, VaultError> {
        Ok(self
            .doc
            .envelopes
            .iter()
            .map(|(id, env)| (id.clone(), env.clone()))
            .collect())
    }

    fn load_recovery_codes(&self) -> Result<Vec<RecoveryCode>, VaultError> {
        Ok(self.doc.recovery_codes.clone())
    }

    fn store_recovery_codes(&mut self, codes: &[RecoveryCode]) -> Result<(), VaultError> {
        self.doc.recovery_codes = codes.to_vec();
        self.persist()
    }

    fn commit_rotation(
        &mut self,
        record: &MasterKeyRecord,
        envelopes: &[(String, VaultSecretEnvelope)],
    ) -> Result<(), VaultError> {
        // Stage the whole replacement in memory, persist once. If the
        // persist fails, restore the previous in-memory view so the handle
        // still matches the on-disk document.
        let previous = self.doc.clone();
        self.doc.master = Some(record.clone());
        self.doc.envelopes = envelopes
            .iter()
            .map(|(id, env)| (id.clone(), env.clone()))
            .collect();
        if let Err(e) = self.persist() {
            self.doc = previous;
            return Err(e);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
