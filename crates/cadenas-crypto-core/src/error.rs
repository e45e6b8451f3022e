//! Cryptographic error types for `cadenas-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (PBKDF2 parameter validation, bad salt).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure (AES-256-GCM seal).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed — ciphertext tampered or wrong key.
    ///
    /// No plaintext bytes are ever released when this is returned.
    #[error("decryption failed: authentication tag mismatch")]
    Integrity,

    /// Structurally malformed envelope or ciphertext (wrong lengths,
    /// missing fields, invalid encoding).
    #[error("malformed envelope: {0}")]
    Format(String),

    /// Envelope was produced by a newer implementation than this one.
    #[error("unsupported envelope version {version} (this build supports up to {supported})")]
    UnsupportedVersion {
        /// Version found in the envelope.
        version: u8,
        /// Highest version this implementation can open.
        supported: u8,
    },

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Secure memory allocation failure (mlock, CSPRNG).
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// Password generation failure (invalid parameters).
    #[error("password generation error: {0}")]
    PasswordGeneration(String),
}
