//! Versioned storable envelope for encrypted secrets.
//!
//! This module provides:
//! - [`seal`] — encrypt a secret and wrap it into a [`VaultSecretEnvelope`]
//! - [`open`] — unwrap and decrypt an envelope, failing closed on anything off
//! - [`VaultSecretEnvelope`] — the serializable iv + ciphertext + tag + version bundle
//!
//! Envelopes are what the storage collaborator persists, one per stored
//! credential. Binary fields are base64 so the whole record is transport-safe
//! text. The envelope version is stamped at seal time and also bound into the
//! AEAD additional data: an envelope whose version field was edited after the
//! fact fails authentication rather than being decrypted under the wrong
//! assumptions, and an envelope from a future format version is rejected
//! before any ciphertext is touched.

use crate::cipher::{self, SealedSecret, IV_LEN, TAG_LEN};
use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One encrypted secret, ready for storage as structured text.
///
/// `iv`, `ciphertext`, and `tag` are base64. The envelope carries no hint of
/// what it protects — association with a connection record is the storage
/// layer's business.
#[must_use = "a sealed envelope must be handed to storage"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSecretEnvelope {
    /// Envelope format version ([`ENVELOPE_VERSION`] at seal time).
    pub version: u8,
    /// Base64 96-bit IV.
    pub iv: String,
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Base64 128-bit authentication tag.
    pub tag: String,
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Encrypt `secret` under `key` and wrap the result into an envelope.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` if the key is not 32 bytes,
/// `CryptoError::Encryption` if the cipher fails.
pub fn seal(secret: &[u8], key: &[u8]) -> Result<VaultSecretEnvelope, CryptoError> {
    let sealed = cipher::encrypt(secret, key, &version_aad(ENVELOPE_VERSION))?;
    Ok(VaultSecretEnvelope {
        version: ENVELOPE_VERSION,
        iv: BASE64.encode(&sealed.iv),
        ciphertext: BASE64.encode(&sealed.ciphertext),
        tag: BASE64.encode(&sealed.tag),
    })
}

/// Unwrap and decrypt an envelope.
///
/// Version is checked first: anything newer than [`ENVELOPE_VERSION`] fails
/// closed without touching the ciphertext. Field decoding problems are
/// [`CryptoError::Format`]; a tag mismatch is [`CryptoError::Integrity`],
/// propagated unchanged from the cipher.
///
/// # Errors
///
/// - `CryptoError::UnsupportedVersion` — envelope from a newer implementation
/// - `CryptoError::Format` — invalid base64 or wrong iv/tag length
/// - `CryptoError::Integrity` — authentication failure
/// - `CryptoError::InvalidKeyMaterial` — key is not 32 bytes
pub fn open(envelope: &VaultSecretEnvelope, key: &[u8]) -> Result<SecretBuffer, CryptoError> {
    if envelope.version > ENVELOPE_VERSION {
        return Err(CryptoError::UnsupportedVersion {
            version: envelope.version,
            supported: ENVELOPE_VERSION,
        });
    }

    let iv_bytes = decode_field(&envelope.iv, "iv")?;
    let ciphertext = decode_field(&envelope.ciphertext, "ciphertext")?;
    let tag_bytes = decode_field(&envelope.tag, "tag")?;

    let iv: [u8; IV_LEN] = iv_bytes.as_slice().try_into().map_err(|_| {
        CryptoError::Format(format!(
            "iv is {} bytes (expected {IV_LEN})",
            iv_bytes.len()
        ))
    })?;
    let tag: [u8; TAG_LEN] = tag_bytes.as_slice().try_into().map_err(|_| {
        CryptoError::Format(format!(
            "tag is {} bytes (expected {TAG_LEN})",
            tag_bytes.len()
        ))
    })?;

    let sealed = SealedSecret {
        iv,
        ciphertext,
        tag,
    };
    cipher::decrypt(&sealed, key, &version_aad(envelope.version))
}

/// AAD binding the envelope version into the authentication tag.
fn version_aad(version: u8) -> [u8; 2] {
    [b'v', version]
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(value.as_bytes())
        .map_err(|e| CryptoError::Format(format!("invalid base64 in {field}: {e}")))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
