#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for AES-256-GCM authenticated encryption.

use cadenas_crypto_core::cipher::{decrypt, encrypt, KEY_LEN};
use cadenas_crypto_core::CryptoError;
use proptest::prelude::*;

/// Fixed key for property tests.
const PROP_KEY: [u8; KEY_LEN] = [0xCC; KEY_LEN];

proptest! {
    /// Encrypt→decrypt roundtrip always recovers the original plaintext.
    #[test]
    fn encrypt_decrypt_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let sealed = encrypt(&plaintext, &PROP_KEY, &[])
            .expect("encrypt should succeed");
        let decrypted = decrypt(&sealed, &PROP_KEY, &[])
            .expect("decrypt should succeed");
        prop_assert_eq!(decrypted.expose(), plaintext.as_slice());
    }

    /// Roundtrip holds for arbitrary AAD as well.
    #[test]
    fn encrypt_decrypt_roundtrip_with_aad(
        plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
        aad in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let sealed = encrypt(&plaintext, &PROP_KEY, &aad)
            .expect("encrypt should succeed");
        let decrypted = decrypt(&sealed, &PROP_KEY, &aad)
            .expect("decrypt should succeed");
        prop_assert_eq!(decrypted.expose(), plaintext.as_slice());
    }

    /// Flipping any single ciphertext bit yields an integrity error, never
    /// altered plaintext.
    #[test]
    fn single_bit_flip_in_ciphertext_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 1..512),
        byte_index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut sealed = encrypt(&plaintext, &PROP_KEY, &[])
            .expect("encrypt should succeed");
        let idx = byte_index.index(sealed.ciphertext.len());
        sealed.ciphertext[idx] ^= 1 << bit;
        prop_assert!(matches!(
            decrypt(&sealed, &PROP_KEY, &[]),
            Err(CryptoError::Integrity)
        ));
    }

    /// Flipping any single tag bit yields an integrity error.
    #[test]
    fn single_bit_flip_in_tag_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        byte_index in 0usize..16,
        bit in 0u8..8,
    ) {
        let mut sealed = encrypt(&plaintext, &PROP_KEY, &[])
            .expect("encrypt should succeed");
        sealed.tag[byte_index] ^= 1 << bit;
        prop_assert!(matches!(
            decrypt(&sealed, &PROP_KEY, &[]),
            Err(CryptoError::Integrity)
        ));
    }
}
