//! The key hierarchy: password → UEK, master key → (KEK, MAK).
//!
//! `UEK` only ever wraps/unwraps the master key (`wmk.rs`); `KEK` is derived
//! but unused by the manifest path today, reserved for future per-item
//! wrapping; `MAK` is the only long-lived runtime secret, held by the
//! `Keystore` until lock.

use crate::crypto::{self, KeyMaterial, SecretBytes};
use crate::error::{LockMarkError, Result};
use serde::{Deserialize, Serialize};

/// HKDF `info` labels, frozen. Changing either implies a new label, not an
/// in-place edit — existing wrapped keys would silently stop deriving the
/// same sub-keys.
pub const HKDF_INFO_KEK: &[u8] = b"VAULT/KEK v1";
pub const HKDF_INFO_MAK: &[u8] = b"VAULT/MAK v1";

/// Key derivation parameters as supplied by the server for a given user
/// (spec §6.1). `hkdf_salt` is `None` only for legacy users who unlocked
/// before HKDF salts were issued separately from the Argon2 salt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub algo: String,
    pub salt: Vec<u8>,
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
    pub hkdf_salt: Option<Vec<u8>>,
}

impl KdfParams {
    #[must_use]
    pub fn fresh(salt: Vec<u8>, hkdf_salt: Vec<u8>, m_cost_kib: u32, t_cost: u32, p_cost: u32) -> Self {
        Self {
            algo: "argon2id".to_string(),
            salt,
            m_cost_kib,
            t_cost,
            p_cost,
            hkdf_salt: Some(hkdf_salt),
        }
    }

    /// The HKDF salt to use when deriving sub-keys: the explicit salt if the
    /// server issued one, otherwise the legacy fallback of reusing the
    /// Argon2 salt. Read-path only — see `KdfParams::require_explicit_hkdf_salt`.
    #[must_use]
    pub fn hkdf_salt_for_read(&self) -> &[u8] {
        self.hkdf_salt.as_deref().unwrap_or(&self.salt)
    }

    /// Enforces that a first-unlock (write) path carries an explicit HKDF
    /// salt, per the resolved Open Question in `DESIGN.md`.
    pub fn require_explicit_hkdf_salt(&self) -> Result<&[u8]> {
        self.hkdf_salt
            .as_deref()
            .ok_or_else(|| LockMarkError::Malformed("missing explicit hkdf_salt on first unlock".into()))
    }
}

/// Derives the User Encryption Key from the master password using the
/// server-provided Argon2id parameters. Never logs or echoes `password`.
pub fn derive_uek(password: &SecretBytes, kdf_params: &KdfParams) -> Result<KeyMaterial> {
    if kdf_params.algo != "argon2id" {
        return Err(LockMarkError::Malformed(format!(
            "unsupported kdf algorithm: {}",
            kdf_params.algo
        )));
    }
    let uek = crypto::kdf_argon2id(
        password.as_bytes(),
        &kdf_params.salt,
        kdf_params.m_cost_kib,
        kdf_params.t_cost,
        kdf_params.p_cost,
    )?;
    Ok(uek)
}

/// Derives `(KEK, MAK)` from the master key via two independent HKDF-SHA256
/// extractions sharing `hkdf_salt` but using distinct `info` labels.
pub fn derive_sub_keys(mk: &KeyMaterial, hkdf_salt: &[u8]) -> Result<(KeyMaterial, KeyMaterial)> {
    let kek = crypto::hkdf_sha256(mk.as_bytes(), hkdf_salt, HKDF_INFO_KEK)?;
    let mak = crypto::hkdf_sha256(mk.as_bytes(), hkdf_salt, HKDF_INFO_MAK)?;
    Ok((kek, mak))
}
