//! Manifest sealing: the bookmark index itself, encrypted under MAK.
//!
//! Unlike the wrapped master key, a sealed manifest is stored and
//! transported as a JSON object (`nonce_b64`/`ciphertext_b64`) rather than a
//! single concatenated blob, since the server persists it verbatim and may
//! need to inspect envelope metadata without decrypting.

use crate::aad::{AadContext, Label};
use crate::crypto::{self, KeyMaterial, NONCE_LEN};
use crate::error::{LockMarkError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedManifest {
    pub nonce_b64: String,
    pub ciphertext_b64: String,
}

/// Encrypts `plaintext` (the serialized bookmark manifest) under `mak`.
pub fn seal_manifest(mak: &KeyMaterial, aad: &AadContext, plaintext: &[u8]) -> Result<SealedManifest> {
    let aad_bytes = aad.compute(Label::ManifestV1);
    let (nonce, ciphertext) = crypto::aead_seal(mak, &aad_bytes, plaintext)?;
    Ok(SealedManifest {
        nonce_b64: BASE64.encode(nonce),
        ciphertext_b64: BASE64.encode(ciphertext),
    })
}

/// Decrypts a previously sealed manifest. A tag mismatch surfaces as
/// `LockMarkError::Malformed` — this is a locally-stored or server-fetched
/// blob, not a password guess, so there is no oracle-attack reason to mask
/// it behind `WrongPassword`.
pub fn open_manifest(
    mak: &KeyMaterial,
    aad: &AadContext,
    sealed: &SealedManifest,
) -> Result<Zeroizing<Vec<u8>>> {
    let nonce = BASE64
        .decode(&sealed.nonce_b64)
        .map_err(|e| LockMarkError::Malformed(format!("invalid manifest nonce: {e}")))?;
    let ciphertext = BASE64
        .decode(&sealed.ciphertext_b64)
        .map_err(|e| LockMarkError::Malformed(format!("invalid manifest ciphertext: {e}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(LockMarkError::Malformed("manifest nonce has wrong length".into()));
    }
    let aad_bytes = aad.compute(Label::ManifestV1);
    crypto::aead_open(mak, &nonce, &aad_bytes, &ciphertext)
        .map_err(|_| LockMarkError::Malformed("manifest failed to authenticate".into()))
}
