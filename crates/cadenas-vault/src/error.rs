//! Vault error types for `cadenas-vault`.

use cadenas_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Master password verification failed.
    #[error("invalid master password")]
    InvalidCredentials,

    /// Candidate master password scored below the acceptance threshold.
    #[error("password too weak (score {score}, need {required})")]
    WeakPassword {
        /// The score the estimator produced.
        score: u8,
        /// The configured acceptance threshold.
        required: u8,
        /// Suggestions from the strength estimator.
        feedback: Vec<String>,
    },

    /// Vault is locked — the operation needs a live session key.
    #[error("vault is locked")]
    Locked,

    /// A master key record already exists; `setup` refuses to overwrite it.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// No master key record exists yet.
    #[error("vault is not initialized")]
    Uninitialized,

    /// The submitted recovery code matches nothing.
    #[error("invalid recovery code")]
    RecoveryCodeInvalid,

    /// The matched recovery code was already consumed.
    #[error("recovery code already used")]
    RecoveryCodeUsed,

    /// The matched recovery code is locked after too many failed attempts.
    #[error("recovery code locked after too many failed attempts")]
    RecoveryCodeLocked,

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}
