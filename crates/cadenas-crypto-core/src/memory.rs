//! Secure memory wrappers for key material and decrypted secrets.
//!
//! Everything that ever holds a derived key or a decrypted credential goes
//! through one of these types:
//! - [`SecretBuffer`] — variable-length plaintext (decrypted secrets)
//! - [`KeyMaterial`] — a 256-bit symmetric key (derived or session key)
//!
//! Both zeroize on drop, mask their `Debug` output, and `mlock` their
//! backing pages on a best-effort basis so key bytes never reach swap.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key length in bytes (256 bits). Every key in the vault is this size.
pub const KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// mlock guard
// ---------------------------------------------------------------------------

/// RAII guard pinning a memory region in RAM; `munlock`s on drop.
///
/// Locking is best-effort: if `mlock` fails (quota, privileges) the region
/// simply stays swappable and a one-time warning is printed. The zeroize
/// guarantee of the owning type is independent of lock status.
pub(crate) struct PinnedRegion {
    ptr: *const u8,
    len: usize,
    locked: bool,
}

// SAFETY: the pointer is only passed to mlock/munlock, which are thread-safe;
// the pointed-to data is owned and accessed by the wrapping secret type.
unsafe impl Send for PinnedRegion {}
unsafe impl Sync for PinnedRegion {}

impl PinnedRegion {
    pub(crate) fn pin(ptr: *const u8, len: usize) -> Self {
        let locked = platform::try_mlock(ptr, len);
        if !locked && len > 0 {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| {
                eprintln!(
                    "[cadenas-crypto-core] WARNING: mlock failed — \
                     key material may be swapped to disk. \
                     Consider raising RLIMIT_MEMLOCK."
                );
            });
        }
        Self { ptr, len, locked }
    }

    const fn unpinned() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            locked: false,
        }
    }

    pub(crate) const fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for PinnedRegion {
    fn drop(&mut self) {
        if self.locked {
            platform::try_munlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer — variable-length
// ---------------------------------------------------------------------------

/// Variable-length buffer for decrypted secret bytes.
///
/// Wraps [`SecretSlice<u8>`] from `secrecy`, adding best-effort `mlock`
/// and a masked `Debug` (`SecretBuffer(***)`). Zeroized on drop.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    _pin: PinnedRegion,
}

impl SecretBuffer {
    /// Copy `data` into a new locked allocation.
    ///
    /// The caller remains responsible for zeroizing the source.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if allocation fails.
    pub fn new(data: &[u8]) -> Result<Self, CryptoError> {
        let inner: SecretSlice<u8> = data.to_vec().into();
        let exposed = inner.expose_secret();
        let pin = PinnedRegion::pin(exposed.as_ptr(), exposed.len());
        Ok(Self { inner, _pin: pin })
    }

    /// Expose the underlying bytes for a cryptographic operation.
    ///
    /// Keep the exposure short-lived — prefer using the slice inside a
    /// single expression over binding it to a long-lived variable.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Returns `true` if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// KeyMaterial — 256-bit symmetric key
// ---------------------------------------------------------------------------

/// A 256-bit symmetric key — derived from the master password or held for
/// the duration of an unlocked session.
///
/// Zeroized on drop via `zeroize`, pinned via `mlock` where possible.
/// There is deliberately no `Clone`: a key moves, it is not duplicated.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: [u8; KEY_LEN],
    #[zeroize(skip)]
    _pin: PinnedRegion,
}

impl KeyMaterial {
    /// Take ownership of a raw 32-byte key.
    ///
    /// The `mlock` happens at the struct's current address; if the value is
    /// later moved the stale `munlock` is a harmless no-op, and zeroize on
    /// drop holds regardless.
    #[must_use]
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        let mut key = Self {
            bytes,
            _pin: PinnedRegion::unpinned(),
        };
        key._pin = PinnedRegion::pin(key.bytes.as_ptr(), KEY_LEN);
        key
    }

    /// Generate a fresh random key from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        let key = Self::new(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Build a key from a derivation output buffer.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if `buf` is not exactly
    /// 32 bytes.
    pub fn from_buffer(buf: &SecretBuffer) -> Result<Self, CryptoError> {
        if buf.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "derived key is {} bytes (expected {KEY_LEN})",
                buf.len()
            )));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(buf.expose());
        let key = Self::new(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Expose the raw key bytes for a cryptographic operation.
    #[must_use]
    pub const fn expose(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Whether the backing page is currently `mlock`'d.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self._pin.is_locked()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(***)")
    }
}

// ---------------------------------------------------------------------------
// Core dump disabling
// ---------------------------------------------------------------------------

/// Disable core dumps for the current process.
///
/// On Unix sets `RLIMIT_CORE` to 0; elsewhere this is a no-op.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if the `setrlimit` call fails.
pub fn disable_core_dumps() -> Result<(), CryptoError> {
    platform::disable_core_dumps_impl()
}

// ---------------------------------------------------------------------------
// Platform-specific implementations
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    use crate::error::CryptoError;

    pub(super) fn try_mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock tolerates any valid pointer/length pair; an invalid
        // region yields ENOMEM, which we report as "not locked".
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn try_munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: munlock failure is non-critical.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }

    pub(super) fn disable_core_dumps_impl() -> Result<(), CryptoError> {
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with RLIMIT_CORE is a standard POSIX call.
        let ret = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) };
        if ret != 0 {
            return Err(CryptoError::SecureMemory(
                "failed to disable core dumps via RLIMIT_CORE".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod platform {
    use crate::error::CryptoError;

    pub(super) fn try_mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn try_munlock(_ptr: *const u8, _len: usize) {}

    pub(super) fn disable_core_dumps_impl() -> Result<(), CryptoError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
