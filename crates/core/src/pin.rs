//! PIN-based quick unlock: a second, independent path into an unlocked
//! `Keystore` that never touches the server-provided password KDF.
//!
//! Two Argon2id invocations with independent salts: one for verification
//! (`pin_hash`), one whose output is only ever used as an AEAD key and is
//! never persisted (`pin_key`).

use crate::aad::{AadContext, Label};
use crate::config::CoreConfig;
use crate::crypto::{self, KeyMaterial, SecretBytes, NONCE_LEN};
use crate::error::{LockMarkError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Fixed, independent of the server's password KDF: spec §4.5.
pub struct PinPolicy;

impl PinPolicy {
    pub const M_COST_KIB: u32 = 64 * 1024;
    pub const T_COST: u32 = 3;
    pub const P_COST: u32 = 1;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinStoreData {
    pub pin_hash: Vec<u8>,
    pub pin_hash_salt: Vec<u8>,
    pub pin_key_salt: Vec<u8>,
    /// base64(nonce ‖ ciphertext), MAK encrypted under the PIN-derived key.
    pub encrypted_mak: String,
    pub aad: AadContext,
    pub version: u32,
}

pub enum PinUnlockOutcome {
    Unlocked { mak: KeyMaterial, aad: AadContext },
    WrongPin,
    HardLocked,
}

fn validate_pin_shape(pin: &SecretBytes) -> Result<()> {
    let digits = pin.as_bytes();
    if digits.len() < 4 || digits.len() > 8 || !digits.iter().all(u8::is_ascii_digit) {
        return Err(LockMarkError::Malformed("pin must be 4-8 ascii digits".into()));
    }
    Ok(())
}

fn derive_pin_subkey(pin: &SecretBytes, salt: &[u8]) -> Result<KeyMaterial> {
    crypto::kdf_argon2id(pin.as_bytes(), salt, PinPolicy::M_COST_KIB, PinPolicy::T_COST, PinPolicy::P_COST)
        .map_err(Into::into)
}

/// Requires a currently unlocked MAK, supplied by the orchestrator — there
/// is no standalone way to call this without already holding a `Keystore`.
pub fn setup_pin(pin: &SecretBytes, mak: &KeyMaterial, aad: &AadContext) -> Result<PinStoreData> {
    validate_pin_shape(pin)?;

    let pin_hash_salt = crypto::random_bytes(16)?;
    let pin_key_salt = crypto::random_bytes(16)?;

    let pin_hash_key = derive_pin_subkey(pin, &pin_hash_salt)?;
    let pin_hash = pin_hash_key.as_bytes().to_vec();

    let pin_key = derive_pin_subkey(pin, &pin_key_salt)?;
    let aad_bytes = aad.compute(Label::PinMakV1);
    let (nonce, ciphertext) = crypto::aead_seal(&pin_key, &aad_bytes, mak.as_bytes())?;

    let mut wire = Vec::with_capacity(nonce.len() + ciphertext.len());
    wire.extend_from_slice(&nonce);
    wire.extend_from_slice(&ciphertext);

    Ok(PinStoreData {
        pin_hash,
        pin_hash_salt,
        pin_key_salt,
        encrypted_mak: BASE64.encode(wire),
        aad: aad.clone(),
        version: 1,
    })
}

/// Constant-time verification irrespective of how the stored hash compares
/// in length to a freshly computed one (`ct_eq` itself treats a length
/// mismatch as "not equal" without a data-dependent branch on content).
pub fn verify_pin(pin: &SecretBytes, store: &PinStoreData) -> Result<bool> {
    validate_pin_shape(pin)?;
    let candidate = derive_pin_subkey(pin, &store.pin_hash_salt)?;
    Ok(crypto::ct_eq(candidate.as_bytes(), &store.pin_hash))
}

fn decrypt_mak(pin: &SecretBytes, store: &PinStoreData) -> Result<Zeroizing<Vec<u8>>> {
    let wire = BASE64
        .decode(&store.encrypted_mak)
        .map_err(|e| LockMarkError::Malformed(format!("invalid encrypted_mak: {e}")))?;
    if wire.len() < NONCE_LEN {
        return Err(LockMarkError::Malformed("encrypted_mak too short".into()));
    }
    let (nonce, ciphertext) = wire.split_at(NONCE_LEN);

    let pin_key = derive_pin_subkey(pin, &store.pin_key_salt)?;
    let aad_bytes = store.aad.compute(Label::PinMakV1);
    crypto::aead_open(&pin_key, nonce, &aad_bytes, ciphertext).map_err(|_| {
        LockMarkError::Malformed("pin-wrapped master access key failed to authenticate".into())
    })
}

/// The four-step algorithm from spec §4.5, parameterized over the caller's
/// already-loaded `PinStoreData`/lockout state so this module never reaches
/// into `SecureStore` directly.
///
/// `is_hard_locked` and `failed_attempts` are read from the caller's
/// `LockState`; the caller is responsible for persisting whatever mutation
/// this function implies (increment, reset, or delete) before acting on the
/// returned outcome, per spec §5's "persist before returning" ordering rule.
pub struct PinUnlockDecision {
    pub outcome: PinUnlockOutcome,
    pub new_failed_attempts: u8,
    pub should_delete_pin_store: bool,
}

pub fn unlock_with_pin(
    pin: &SecretBytes,
    store: Option<&PinStoreData>,
    is_hard_locked: bool,
    failed_attempts: u8,
    config: &CoreConfig,
) -> Result<PinUnlockDecision> {
    let Some(store) = store else {
        return Err(LockMarkError::NotConfigured);
    };
    if is_hard_locked {
        return Ok(PinUnlockDecision {
            outcome: PinUnlockOutcome::HardLocked,
            new_failed_attempts: failed_attempts,
            should_delete_pin_store: false,
        });
    }

    if verify_pin(pin, store)? {
        let decrypted = decrypt_mak(pin, store)?;
        if decrypted.len() != crypto::KEY_LEN {
            return Err(LockMarkError::Malformed("decrypted mak has wrong length".into()));
        }
        let mut mak_bytes = [0u8; crypto::KEY_LEN];
        mak_bytes.copy_from_slice(&decrypted);
        return Ok(PinUnlockDecision {
            outcome: PinUnlockOutcome::Unlocked {
                mak: KeyMaterial(mak_bytes),
                aad: store.aad.clone(),
            },
            new_failed_attempts: 0,
            should_delete_pin_store: false,
        });
    }

    let attempts = failed_attempts.saturating_add(1);
    if attempts >= config.pin_lockout_threshold {
        return Ok(PinUnlockDecision {
            outcome: PinUnlockOutcome::HardLocked,
            new_failed_attempts: attempts,
            should_delete_pin_store: true,
        });
    }
    Ok(PinUnlockDecision {
        outcome: PinUnlockOutcome::WrongPin,
        new_failed_attempts: attempts,
        should_delete_pin_store: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(s: &str) -> SecretBytes {
        SecretBytes::from(s)
    }

    #[test]
    fn setup_then_verify_succeeds_with_correct_pin() {
        let mak = KeyMaterial::random().unwrap();
        let aad = AadContext::new("u_1", "v_1");
        let store = setup_pin(&pin("4321"), &mak, &aad).unwrap();
        assert!(verify_pin(&pin("4321"), &store).unwrap());
        assert!(!verify_pin(&pin("9999"), &store).unwrap());
    }

    #[test]
    fn setup_rejects_non_digit_or_wrong_length_pin() {
        let mak = KeyMaterial::random().unwrap();
        let aad = AadContext::new("u_1", "v_1");
        assert!(setup_pin(&pin("12"), &mak, &aad).is_err());
        assert!(setup_pin(&pin("12ab"), &mak, &aad).is_err());
        assert!(setup_pin(&pin("123456789"), &mak, &aad).is_err());
    }

    #[test]
    fn unlock_with_pin_recovers_original_mak() {
        let mak = KeyMaterial::random().unwrap();
        let aad = AadContext::new("u_1", "v_1");
        let store = setup_pin(&pin("1234"), &mak, &aad).unwrap();
        let config = CoreConfig::default();

        let decision = unlock_with_pin(&pin("1234"), Some(&store), false, 0, &config).unwrap();
        match decision.outcome {
            PinUnlockOutcome::Unlocked { mak: recovered, .. } => assert_eq!(recovered.0, mak.0),
            _ => panic!("expected Unlocked"),
        }
        assert_eq!(decision.new_failed_attempts, 0);
        assert!(!decision.should_delete_pin_store);
    }

    #[test]
    fn unlock_with_pin_missing_store_is_not_configured() {
        let config = CoreConfig::default();
        let err = unlock_with_pin(&pin("1234"), None, false, 0, &config).unwrap_err();
        assert!(matches!(err, LockMarkError::NotConfigured));
    }

    #[test]
    fn unlock_with_pin_hard_locked_short_circuits_before_pin_check() {
        let mak = KeyMaterial::random().unwrap();
        let aad = AadContext::new("u_1", "v_1");
        let store = setup_pin(&pin("1234"), &mak, &aad).unwrap();
        let config = CoreConfig::default();

        let decision = unlock_with_pin(&pin("0000"), Some(&store), true, 2, &config).unwrap();
        assert!(matches!(decision.outcome, PinUnlockOutcome::HardLocked));
        assert_eq!(decision.new_failed_attempts, 2);
        assert!(!decision.should_delete_pin_store);
    }

    #[test]
    fn third_failed_attempt_hard_locks_and_marks_pin_store_for_deletion() {
        let mak = KeyMaterial::random().unwrap();
        let aad = AadContext::new("u_1", "v_1");
        let store = setup_pin(&pin("1234"), &mak, &aad).unwrap();
        let config = CoreConfig::default();

        let first = unlock_with_pin(&pin("0000"), Some(&store), false, 0, &config).unwrap();
        assert!(matches!(first.outcome, PinUnlockOutcome::WrongPin));
        assert_eq!(first.new_failed_attempts, 1);

        let second = unlock_with_pin(&pin("0000"), Some(&store), false, 1, &config).unwrap();
        assert!(matches!(second.outcome, PinUnlockOutcome::WrongPin));
        assert_eq!(second.new_failed_attempts, 2);

        let third = unlock_with_pin(&pin("0000"), Some(&store), false, 2, &config).unwrap();
        assert!(matches!(third.outcome, PinUnlockOutcome::HardLocked));
        assert_eq!(third.new_failed_attempts, 3);
        assert!(third.should_delete_pin_store);
    }
}
