//! Recovery codes — the break-glass path when the master password is lost.
//!
//! Codes are generated in batches while unlocked, shown to the user exactly
//! once, and persisted only as SHA-256 hashes. Each code is single-use and
//! carries its own attempt counter: five failed verifications lock a code
//! permanently, independent of the others.
//!
//! A successful reset installs a fresh master key record and purges every
//! sealed secret in the same storage commit — the old key is gone, so the
//! old ciphertexts are unreadable anyway; keeping them would only be a
//! liability.

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VaultError;
use crate::master_key::MasterKeyManager;
use crate::storage::VaultStore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of codes in a generated batch.
pub const BATCH_SIZE: usize = 6;

/// Failed verifications before a code locks permanently.
pub const MAX_ATTEMPTS: u32 = 5;

/// Groups of characters per code, joined by dashes: `XXXX-XXXX-XXXX`.
const CODE_GROUPS: usize = 3;
const GROUP_LEN: usize = 4;
const CODE_DISPLAY_LEN: usize = CODE_GROUPS * GROUP_LEN + (CODE_GROUPS - 1);

/// Code alphabet: uppercase plus digits, with 0/O/1/I removed to keep
/// hand-typed codes unambiguous. 32 symbols, so 12 characters carry 60 bits.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Persisted state for a single recovery code. The plaintext code never
/// touches storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryCode {
    /// SHA-256 over the normalized code.
    pub code_hash: Vec<u8>,
    /// Whether the code was already redeemed.
    pub used: bool,
    /// Epoch seconds of redemption, if `used`.
    pub used_at: Option<u64>,
    /// Failed verification count.
    pub attempts: u32,
    /// Whether the code locked itself after [`MAX_ATTEMPTS`] failures.
    pub locked: bool,
    /// Epoch seconds at which the code locked, if `locked`.
    pub locked_at: Option<u64>,
}

impl RecoveryCode {
    fn live(&self) -> bool {
        !self.used && !self.locked
    }
}

/// Result of a recovery reset. The forfeited ids let the caller tell the
/// user exactly which stored secrets were purged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResetOutcome {
    /// Connection ids whose sealed secrets were deleted by the reset.
    pub forfeited_secrets: Vec<String>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Recovery code operations, layered over the master key manager so a reset
/// can swap the record and purge envelopes through the same store.
pub struct RecoveryCodeManager<'a, S: VaultStore> {
    master: &'a mut MasterKeyManager<S>,
}

impl<'a, S: VaultStore> RecoveryCodeManager<'a, S> {
    pub fn new(master: &'a mut MasterKeyManager<S>) -> Self {
        Self { master }
    }

    /// Generate a fresh batch of `count` codes ([`BATCH_SIZE`] is the
    /// conventional choice), replacing any previous batch, and return the
    /// plaintext codes. This is the only time the plaintexts exist — the
    /// caller must show them to the user now or never. A `count` of zero
    /// revokes all outstanding codes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Locked`] unless the vault is unlocked —
    /// generating codes is a privileged operation.
    pub fn generate(&mut self, count: usize) -> Result<Vec<String>, VaultError> {
        if self.master.session().is_none() {
            return Err(VaultError::Locked);
        }

        let mut plaintexts = Vec::with_capacity(count);
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let code = random_code();
            records.push(RecoveryCode {
                code_hash: hash_code(&code),
                used: false,
                used_at: None,
                attempts: 0,
                locked: false,
                locked_at: None,
            });
            plaintexts.push(code);
        }

        self.master.store_mut().store_recovery_codes(&records)?;
        tracing::info!(count, "recovery codes generated");
        Ok(plaintexts)
    }

    /// Verify a recovery code and consume it.
    ///
    /// Input is normalized first (case and dashes are ignored), so a code
    /// read over the phone still matches. A successful match marks the code
    /// used; a miss charges one attempt against every still-live code, any
    /// of which locks itself on reaching [`MAX_ATTEMPTS`].
    ///
    /// # Errors
    ///
    /// - [`VaultError::RecoveryCodeUsed`] if the code was already redeemed
    /// - [`VaultError::RecoveryCodeLocked`] if the code locked itself
    /// - [`VaultError::RecoveryCodeInvalid`] if nothing matches
    pub fn verify(&mut self, code: &str) -> Result<(), VaultError> {
        let mut codes = self.master.store_ref().load_recovery_codes()?;
        let index = self.locate_or_charge(&mut codes, code)?;

        codes[index].used = true;
        codes[index].used_at = Some(now_epoch_secs());
        self.master.store_mut().store_recovery_codes(&codes)?;
        tracing::info!("recovery code redeemed");
        Ok(())
    }

    /// Reset the master password with a recovery code.
    ///
    /// The old key is unrecoverable without the old password, so every
    /// sealed secret is purged in the same commit that installs the new
    /// record. The vault ends `Locked`; the caller unlocks with the new
    /// password. The returned [`ResetOutcome`] lists what was forfeited.
    ///
    /// The code is consumed only if the reset goes through: a weak new
    /// password or a storage failure leaves it live.
    ///
    /// # Errors
    ///
    /// - [`VaultError::Uninitialized`] if no master record exists
    /// - [`VaultError::WeakPassword`] if the new password is too weak
    /// - the same code errors as [`Self::verify`]
    pub fn reset_master_password(
        &mut self,
        code: &str,
        new_password: &str,
    ) -> Result<ResetOutcome, VaultError> {
        self.master.require_record()?;

        let mut codes = self.master.store_ref().load_recovery_codes()?;
        let index = self.locate_or_charge(&mut codes, code)?;

        // Matched: gate the new password before burning the code.
        crate::master_key::require_strong_password(new_password)?;

        let (record, _key) = self.master.create_record(new_password)?;
        let forfeited: Vec<String> = self
            .master
            .store_ref()
            .list_envelopes()?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        // New record in, every envelope out, one commit.
        self.master.store_mut().commit_rotation(&record, &[])?;

        codes[index].used = true;
        codes[index].used_at = Some(now_epoch_secs());
        self.master.store_mut().store_recovery_codes(&codes)?;

        self.master.drop_session();
        tracing::warn!(
            forfeited = forfeited.len(),
            "master password reset via recovery code"
        );
        Ok(ResetOutcome {
            forfeited_secrets: forfeited,
        })
    }

    /// Find the live code matching `input`, or apply failure bookkeeping.
    ///
    /// On a miss, charges an attempt to every live code (persisting the
    /// counters) before returning the error.
    fn locate_or_charge(
        &mut self,
        codes: &mut [RecoveryCode],
        input: &str,
    ) -> Result<usize, VaultError> {
        let hash = hash_code(input);

        if let Some(index) = codes.iter().position(|c| hashes_match(&c.code_hash, &hash)) {
            if codes[index].locked {
                return Err(VaultError::RecoveryCodeLocked);
            }
            if codes[index].used {
                return Err(VaultError::RecoveryCodeUsed);
            }
            return Ok(index);
        }

        let now = now_epoch_secs();
        for code in codes.iter_mut().filter(|c| c.live()) {
            code.attempts = code.attempts.saturating_add(1);
            if code.attempts >= MAX_ATTEMPTS {
                code.locked = true;
                code.locked_at = Some(now);
            }
        }
        self.master.store_mut().store_recovery_codes(codes)?;
        tracing::warn!("recovery code verification failed");
        Err(VaultError::RecoveryCodeInvalid)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Strip dashes and whitespace, uppercase the rest.
fn normalize(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn hash_code(code: &str) -> Vec<u8> {
    Sha256::digest(normalize(code).as_bytes()).to_vec()
}

fn hashes_match(a: &[u8], b: &[u8]) -> bool {
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}

fn random_code() -> String {
    let mut rng = OsRng;
    let mut out = String::with_capacity(CODE_DISPLAY_LEN);
    for group in 0..CODE_GROUPS {
        if group > 0 {
            out.push('-');
        }
        for _ in 0..GROUP_LEN {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            out.push(char::from(CODE_ALPHABET[idx]));
        }
    }
    out
}

fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master_key::VaultStatus;
    use crate::storage::MemoryStore;
    use cadenas_crypto_core::kdf::Pbkdf2Params;

    const STRONG: &str = "Str0ng!Passw0rd123";
    const NEW_STRONG: &str = "An0ther#Secret456";

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

    // -- formatting and normalization --

    #[test]
    fn codes_are_formatted_in_dashed_groups() {
        let code = random_code();
        assert_eq!(code.len(), 14);
        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), 3);
        for group in groups {
            assert_eq!(group.len(), 4);
            assert!(group.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn alphabet_skips_ambiguous_symbols() {
        for ambiguous in [b'0', b'O', b'1', b'I'] {
            assert!(!CODE_ALPHABET.contains(&ambiguous));
        }
        assert_eq!(CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn normalization_ignores_case_dashes_and_spaces() {
        assert_eq!(normalize("abcd-efgh-jklm"), "ABCDEFGHJKLM");
        assert_eq!(normalize(" ABCD EFGH JKLM "), "ABCDEFGHJKLM");
        assert_eq!(hash_code("abcd-efgh-jklm"), hash_code("ABCDEFGHJKLM"));
    }

    // -- generation --

    #[test]
    fn generate_requires_unlock() {
        let mut mgr = unlocked_manager();
        mgr.lock();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        assert!(matches!(recovery.generate(BATCH_SIZE), Err(VaultError::Locked)));
    }

    #[test]
    fn generate_returns_a_full_batch() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate should succeed");
        assert_eq!(codes.len(), BATCH_SIZE);
        // All distinct.
        let mut unique = codes.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), BATCH_SIZE);
    }

    #[test]
    fn generate_replaces_the_previous_batch() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let old = recovery.generate(BATCH_SIZE).expect("generate");
        let _new = recovery.generate(BATCH_SIZE).expect("regenerate");
        assert!(matches!(
            recovery.verify(&old[0]),
            Err(VaultError::RecoveryCodeInvalid)
        ));
    }

    #[test]
    fn generate_zero_revokes_all_codes() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");
        let revoked = recovery.generate(0).expect("revoke");
        assert!(revoked.is_empty());
        assert!(matches!(
            recovery.verify(&codes[0]),
            Err(VaultError::RecoveryCodeInvalid)
        ));
    }

    #[test]
    fn stored_codes_hold_hashes_not_plaintext() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");
        let stored = mgr
            .store_ref()
            .load_recovery_codes()
            .expect("load should succeed");
        let json = serde_json::to_string(&stored).expect("serialize");
        for code in &codes {
            assert!(!json.contains(code));
            assert!(!json.contains(&normalize(code)));
        }
    }

    // -- verification --

    #[test]
    fn verify_accepts_a_live_code_once() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");

        recovery.verify(&codes[0]).expect("first use should succeed");
        assert!(matches!(
            recovery.verify(&codes[0]),
            Err(VaultError::RecoveryCodeUsed)
        ));
    }

    #[test]
    fn verify_accepts_sloppy_input() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");
        let sloppy = codes[1].to_lowercase().replace('-', " ");
        recovery.verify(&sloppy).expect("normalized input should match");
    }

    #[test]
    fn failed_verify_charges_every_live_code() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        recovery.generate(BATCH_SIZE).expect("generate");

        assert!(matches!(
            recovery.verify("AAAA-AAAA-AAAA"),
            Err(VaultError::RecoveryCodeInvalid)
        ));
        let stored = mgr.store_ref().load_recovery_codes().expect("load");
        assert!(stored.iter().all(|c| c.attempts == 1));
    }

    #[test]
    fn codes_lock_after_max_attempts() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");

        for _ in 0..MAX_ATTEMPTS {
            assert!(matches!(
                recovery.verify("AAAA-AAAA-AAAA"),
                Err(VaultError::RecoveryCodeInvalid)
            ));
        }
        // Even the correct code is now rejected.
        assert!(matches!(
            recovery.verify(&codes[0]),
            Err(VaultError::RecoveryCodeLocked)
        ));
        let stored = mgr.store_ref().load_recovery_codes().expect("load");
        assert!(stored.iter().all(|c| c.locked && c.locked_at.is_some()));
    }

    #[test]
    fn used_codes_are_not_charged_further() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");
        recovery.verify(&codes[0]).expect("redeem");

        recovery.verify("AAAA-AAAA-AAAA").expect_err("miss");
        let stored = mgr.store_ref().load_recovery_codes().expect("load");
        assert_eq!(stored[0].attempts, 0, "used code keeps its counter");
        assert!(stored.iter().skip(1).all(|c| c.attempts == 1));
    }

    // -- reset --

    #[test]
    fn reset_installs_new_password_and_purges_secrets() {
        let mut mgr = unlocked_manager();
        mgr.store_secret("conn-1", b"alpha").expect("store");
        mgr.store_secret("conn-2", b"bravo").expect("store");
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");

        let outcome = recovery
            .reset_master_password(&codes[0], NEW_STRONG)
            .expect("reset should succeed");
        assert_eq!(
            outcome.forfeited_secrets,
            vec!["conn-1".to_string(), "conn-2".to_string()]
        );

        // Vault ends locked; only the new password opens it.
        assert_eq!(mgr.status().expect("status"), VaultStatus::Locked);
        assert!(matches!(
            mgr.unlock(STRONG),
            Err(VaultError::InvalidCredentials)
        ));
        mgr.unlock(NEW_STRONG).expect("new password should unlock");

        // The purge is real.
        assert!(mgr.load_secret("conn-1").expect("load").is_none());
        assert!(mgr.load_secret("conn-2").expect("load").is_none());
    }

    #[test]
    fn reset_consumes_the_code() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");

        recovery
            .reset_master_password(&codes[0], NEW_STRONG)
            .expect("reset should succeed");
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        assert!(matches!(
            recovery.reset_master_password(&codes[0], "Th1rd!Passw0rd789"),
            Err(VaultError::RecoveryCodeUsed)
        ));
    }

    #[test]
    fn reset_with_weak_password_keeps_code_live() {
        let mut mgr = unlocked_manager();
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        let codes = recovery.generate(BATCH_SIZE).expect("generate");

        assert!(matches!(
            recovery.reset_master_password(&codes[0], "weak"),
            Err(VaultError::WeakPassword { .. })
        ));
        // Original password still works, code still redeemable.
        recovery
            .reset_master_password(&codes[0], NEW_STRONG)
            .expect("code should still be live");
    }

    #[test]
    fn reset_with_invalid_code_changes_nothing() {
        let mut mgr = unlocked_manager();
        mgr.store_secret("conn-1", b"alpha").expect("store");
        let mut recovery = RecoveryCodeManager::new(&mut mgr);
        recovery.generate(BATCH_SIZE).expect("generate");

        assert!(matches!(
            recovery.reset_master_password("AAAA-AAAA-AAAA", NEW_STRONG),
            Err(VaultError::RecoveryCodeInvalid)
        ));
        assert_eq!(
            mgr.load_secret("conn-1").expect("load").expect("exists").expose(),
            b"alpha"
        );
        mgr.lock();
        mgr.unlock(STRONG).expect("original password still unlocks");
    }
}
