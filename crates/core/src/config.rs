//! Policy knobs that are *not* cryptographic truth.
//!
//! These mirror the teacher's `BackupConfig`/`AutoLockConfig` pattern: small,
//! serializable, `Default`-able structs that a caller may override, kept
//! separate from the frozen cryptographic constants in `keys.rs`/`wmk.rs`.

use serde::{Deserialize, Serialize};

/// PIN lockout threshold, fixed by spec at 3 but expressed as policy so a
/// future migration doesn't require touching the state machine itself.
pub const PIN_LOCKOUT_THRESHOLD: u8 = 3;

/// Argon2id defaults for a brand-new user's password KDF, used only when no
/// server-provided `KdfParams` exist yet (first unlock ever).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultPasswordKdf {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for DefaultPasswordKdf {
    fn default() -> Self {
        Self {
            m_cost_kib: 19_456, // ~19 MiB
            t_cost: 3,
            p_cost: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// When `true` (default), a first-unlock write path that lacks an
    /// explicit `hkdf_salt` is rejected rather than silently falling back to
    /// reusing the Argon2 salt. The fallback itself remains available on the
    /// *read* path for existing legacy users regardless of this flag.
    pub require_explicit_hkdf_salt_on_write: bool,
    pub default_password_kdf: DefaultPasswordKdf,
    pub pin_lockout_threshold: u8,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            require_explicit_hkdf_salt_on_write: true,
            default_password_kdf: DefaultPasswordKdf::default(),
            pin_lockout_threshold: PIN_LOCKOUT_THRESHOLD,
        }
    }
}
