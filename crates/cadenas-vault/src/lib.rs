//! `cadenas-vault` — Vault business logic for CADENAS.
//!
//! Manages the master key lifecycle (setup, unlock, lock, rotate), sealed
//! secret storage keyed by connection id, and recovery codes for master
//! password reset. Cryptographic primitives live in `cadenas-crypto-core`;
//! this crate owns the state machine and the storage collaborator.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod master_key;
pub mod recovery;
pub mod storage;

pub use error::VaultError;
pub use master_key::{
    MasterKeyManager, MasterKeyRecord, VaultSession, VaultStatus, MIN_MASTER_SCORE,
};
pub use recovery::{
    RecoveryCode, RecoveryCodeManager, ResetOutcome, BATCH_SIZE, MAX_ATTEMPTS,
};
pub use storage::{JsonFileStore, MemoryStore, VaultStore};
