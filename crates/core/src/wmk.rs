//! Wrapped Master Key codec and wrap/unwrap protocol.
//!
//! Wire layout: `base64(nonce(24) ‖ ciphertext ‖ tag(16))`. The AEAD tag is
//! the only integrity check — there is no separate HMAC verifier, unlike
//! the teacher's `wrap_vault_key`: a tag failure here directly means "wrong
//! password or corrupted blob", which is exactly the ambiguity spec §4.3
//! asks for (`WrongPassword`, "indistinguishable from a corrupted blob").

use crate::aad::{AadContext, Label};
use crate::crypto::{self, KeyMaterial, NONCE_LEN, TAG_LEN};
use crate::error::{LockMarkError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedMasterKey {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl WrappedMasterKey {
    #[must_use]
    pub fn to_base64(&self) -> String {
        let mut buf = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        BASE64.encode(buf)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let raw = BASE64
            .decode(s)
            .map_err(|e| LockMarkError::Malformed(format!("invalid base64: {e}")))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(LockMarkError::Malformed("wrapped master key too short".into()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        Ok(Self {
            nonce: nonce.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// First-unlock only: draws a fresh master key, wraps it under `uek`.
pub fn wrap_master_key(uek: &KeyMaterial, mk: &KeyMaterial, aad: &AadContext) -> Result<WrappedMasterKey> {
    let aad_bytes = aad.compute(Label::WmkV1);
    let (nonce, ciphertext) = crypto::aead_seal(uek, &aad_bytes, mk.as_bytes())?;
    Ok(WrappedMasterKey { nonce, ciphertext })
}

/// Unwraps a previously wrapped master key. A tag mismatch (wrong password,
/// wrong `(user_id, vault_id)`, or a corrupted blob) surfaces as
/// `WrongPassword`, never as a distinguishable AEAD error.
pub fn unwrap_master_key(
    uek: &KeyMaterial,
    wrapped: &WrappedMasterKey,
    aad: &AadContext,
) -> Result<KeyMaterial> {
    if wrapped.nonce.len() != NONCE_LEN || wrapped.ciphertext.len() < TAG_LEN {
        return Err(LockMarkError::Malformed("wrapped master key has invalid shape".into()));
    }
    let aad_bytes = aad.compute(Label::WmkV1);
    let plaintext = crypto::aead_open(uek, &wrapped.nonce, &aad_bytes, &wrapped.ciphertext)
        .map_err(|_| LockMarkError::WrongPassword)?;
    if plaintext.len() != crypto::KEY_LEN {
        return Err(LockMarkError::Malformed("unwrapped master key has wrong length".into()));
    }
    let mut mk = [0u8; crypto::KEY_LEN];
    mk.copy_from_slice(&plaintext);
    Ok(KeyMaterial(mk))
}
