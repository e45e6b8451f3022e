//! Cryptographic password generation.
//!
//! Offered so callers can propose a strong replacement whenever
//! [`crate::strength::score`] reports a weak candidate. All randomness comes
//! from `OsRng`.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::CryptoError;

/// Minimum allowed generated length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum allowed generated length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Default generated length.
pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}|;:',.<>?/~";

/// Which character sets to draw from.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CharsetConfig {
    /// Include uppercase letters (A-Z).
    pub uppercase: bool,
    /// Include lowercase letters (a-z).
    pub lowercase: bool,
    /// Include digits (0-9).
    pub digits: bool,
    /// Include symbols.
    pub symbols: bool,
}

impl Default for CharsetConfig {
    fn default() -> Self {
        Self {
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

/// Generate a random password of `length` characters.
///
/// At least one character from each enabled charset is guaranteed; the rest
/// are drawn uniformly from the combined pool and the result is
/// Fisher-Yates shuffled to remove positional bias.
///
/// # Errors
///
/// Returns [`CryptoError::PasswordGeneration`] if `length` is outside
/// [`MIN_PASSWORD_LENGTH`]`..=`[`MAX_PASSWORD_LENGTH`], no charset is
/// enabled, or `length` is smaller than the number of enabled charsets.
pub fn generate_password(length: usize, charsets: &CharsetConfig) -> Result<String, CryptoError> {
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(CryptoError::PasswordGeneration(format!(
            "length must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH}, got {length}"
        )));
    }

    let mut pool: Vec<u8> = Vec::new();
    let mut chars: Vec<u8> = Vec::with_capacity(length);
    let mut rng = rand::rngs::OsRng;

    for set in [
        charsets.uppercase.then_some(UPPERCASE),
        charsets.lowercase.then_some(LOWERCASE),
        charsets.digits.then_some(DIGITS),
        charsets.symbols.then_some(SYMBOLS),
    ]
    .into_iter()
    .flatten()
    {
        pool.extend_from_slice(set);
        chars.push(set[rng.gen_range(0..set.len())]);
    }

    if pool.is_empty() {
        return Err(CryptoError::PasswordGeneration(
            "at least one charset must be enabled".into(),
        ));
    }
    if chars.len() > length {
        return Err(CryptoError::PasswordGeneration(format!(
            "length {length} cannot fit one character from each of {} charsets",
            chars.len()
        )));
    }

    while chars.len() < length {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }
    chars.shuffle(&mut rng);

    String::from_utf8(chars)
        .map_err(|_| CryptoError::PasswordGeneration("generated bytes were not UTF-8".into()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
