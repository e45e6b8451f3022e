//! PBKDF2-HMAC-SHA256 key derivation.
//!
//! This module provides:
//! - [`derive`] — derive a symmetric key from a master secret + salt
//! - [`Pbkdf2Params`] — serializable parameter set (stored in the master key record)
//!
//! Derivation is fully deterministic: the same `(secret, salt, params)` tuple
//! always yields the same key, which is what lets the vault re-derive and
//! check a stored verifier without ever persisting the key itself. The
//! iteration count is deliberately high — a single derivation should cost on
//! the order of 100–200ms so brute-force search stays expensive. Run it off
//! any interactive thread.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Default derived key length in bytes (256 bits).
pub const DEFAULT_KEY_LEN: usize = 32;

/// Minimum salt length in bytes.
pub const MIN_SALT_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// PBKDF2 parameter set — stored alongside the salt in the master key record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    /// Iteration count. Zero is a configuration error.
    pub iterations: u32,
    /// Derived key length in bytes.
    pub key_len: usize,
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            key_len: DEFAULT_KEY_LEN,
        }
    }
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Derive a symmetric key from a secret and salt using PBKDF2-HMAC-SHA256.
///
/// Returns a [`SecretBuffer`] of `params.key_len` bytes. The intermediate
/// output buffer is zeroized after copying. Performs no I/O and has no side
/// effects.
///
/// The secret may be any byte string, including empty — strength validation
/// belongs to the vault layer, not here.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if:
/// - `params.iterations` is zero (rejected before any derivation work)
/// - `params.key_len` is zero
/// - the salt is shorter than 16 bytes
pub fn derive(
    secret: &[u8],
    salt: &[u8],
    params: &Pbkdf2Params,
) -> Result<SecretBuffer, CryptoError> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be at least 1".into(),
        ));
    }
    if params.key_len == 0 {
        return Err(CryptoError::KeyDerivation(
            "derived key length must be at least 1 byte".into(),
        ));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }

    let mut output = vec![0u8; params.key_len];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, params.iterations, &mut output);

    let result = SecretBuffer::new(&output)
        .map_err(|e| CryptoError::KeyDerivation(format!("secure buffer allocation failed: {e}")))?;
    output.zeroize();
    Ok(result)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
