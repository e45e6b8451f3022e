//! `cadenas-crypto-core` — Pure cryptographic primitives for CADENAS.
//!
//! This crate is the audit target: zero I/O, zero async, zero UI dependencies.
//! Everything here is synchronous and CPU-bound; persistence and presentation
//! live in `cadenas-vault` and its callers.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;

pub mod cipher;

pub mod envelope;

pub mod strength;

pub mod generate;

pub use cipher::{decrypt, encrypt, SealedSecret};
pub use envelope::{open, seal, VaultSecretEnvelope, ENVELOPE_VERSION};
pub use error::CryptoError;
pub use generate::{generate_password, CharsetConfig, DEFAULT_PASSWORD_LENGTH};
pub use kdf::{derive, Pbkdf2Params, DEFAULT_ITERATIONS};
pub use memory::{disable_core_dumps, KeyMaterial, SecretBuffer, KEY_LEN};
pub use strength::{score, StrengthReport};
