#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property tests for the vault state machine and recovery code matching.

use proptest::prelude::*;

use cadenas_crypto_core::kdf::Pbkdf2Params;
use cadenas_vault::{MasterKeyManager, MemoryStore, RecoveryCodeManager, VaultError, BATCH_SIZE};

const STRONG: &str = "Str0ng!Passw0rd123";

fn unlocked_manager() -> MasterKeyManager<MemoryStore> {
    let mut mgr = MasterKeyManager::with_params(
        MemoryStore::new(),
        Pbkdf2Params {
            iterations: 10,
            key_len: 32,
        },
    );
    mgr.setup(STRONG).expect("setup should succeed");
    mgr.unlock(STRONG).expect("unlock should succeed");
    mgr
}

proptest! {
    /// No password other than the real one ever opens the vault.
    #[test]
    fn wrong_passwords_never_unlock(candidate in ".{0,40}") {
        prop_assume!(candidate != STRONG);
        let mut mgr = unlocked_manager();
        mgr.lock();
        prop_assert!(matches!(
            mgr.unlock(&candidate),
            Err(VaultError::InvalidCredentials)
        ));
    }

    /// Any stored secret round-trips exactly through seal and open.
    #[test]
    fn stored_secrets_roundtrip(id in "[a-z0-9-]{1,24}", secret in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut mgr = unlocked_manager();
        mgr.store_secret(&id, &secret).expect("store should succeed");
        let loaded = mgr
            .load_secret(&id)
            .expect("load should succeed")
            .expect("secret should exist");
        prop_assert_eq!(loaded.expose(), secret.as_slice());
    }

    /// Case and separator noise never change whether a recovery code matches.
    #[test]
    fn recovery_codes_match_despite_formatting(
        index in 0usize..6,
        lowercase in any::<bool>(),
        space_separators in any::<bool>(),
        padding in 0usize..3,
    ) {
        let mut mgr = unlocked_manager();
        let codes = RecoveryCodeManager::new(&mut mgr)
            .generate(BATCH_SIZE)
            .expect("generate should succeed");

        let mut sloppy = codes[index].clone();
        if lowercase {
            sloppy = sloppy.to_lowercase();
        }
        if space_separators {
            sloppy = sloppy.replace('-', " ");
        }
        let pad = " ".repeat(padding);
        let sloppy = format!("{pad}{sloppy}{pad}");

        RecoveryCodeManager::new(&mut mgr)
            .verify(&sloppy)
            .expect("formatting noise must not break a valid code");
    }

    /// A code that did not come out of `generate` is always rejected.
    #[test]
    fn unknown_codes_are_rejected(fake in "[A-Z2-9]{4}-[A-Z2-9]{4}-[A-Z2-9]{4}") {
        let mut mgr = unlocked_manager();
        let codes = RecoveryCodeManager::new(&mut mgr)
            .generate(BATCH_SIZE)
            .expect("generate should succeed");
        prop_assume!(!codes.contains(&fake));

        prop_assert!(matches!(
            RecoveryCodeManager::new(&mut mgr).verify(&fake),
            Err(VaultError::RecoveryCodeInvalid)
        ));
    }
}
