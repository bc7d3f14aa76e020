//! Thin, typed surface over the primitives LockMark's key hierarchy is built
//! from: Argon2id, HKDF-SHA256, XChaCha20-Poly1305 AEAD, a CSPRNG,
//! constant-time compare and zeroization. No policy lives here — labels,
//! AAD construction and retry behavior belong to the modules that call this
//! one.

use crate::error::CryptoError;
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// A 32-byte symmetric key. Zeroized on drop; never `Debug`-printed.
#[derive(Clone)]
pub struct KeyMaterial(pub [u8; KEY_LEN]);

impl KeyMaterial {
    #[must_use]
    pub fn random() -> Result<Self, CryptoError> {
        let mut k = [0u8; KEY_LEN];
        getrandom::fill(&mut k).map_err(|e| CryptoError::RngFail(e.to_string()))?;
        Ok(Self(k))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(REDACTED)")
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Owned, zeroizing byte buffer for passwords and PINs. Entry points take
/// this by value so callers cannot accidentally retain a reference to the
/// plaintext after the call returns.
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBytes(REDACTED)")
    }
}

impl From<String> for SecretBytes {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<&str> for SecretBytes {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

/// Draws `n` cryptographically secure random bytes.
pub fn random_bytes(n: usize) -> Result<Vec<u8>, CryptoError> {
    let mut buf = vec![0u8; n];
    getrandom::fill(&mut buf).map_err(|e| CryptoError::RngFail(e.to_string()))?;
    Ok(buf)
}

fn random_nonce() -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::fill(&mut nonce).map_err(|e| CryptoError::RngFail(e.to_string()))?;
    Ok(nonce)
}

/// Argon2id key derivation with server/caller-supplied parameters. Output is
/// always 32 bytes. Never logs `password`.
pub fn kdf_argon2id(
    password: &[u8],
    salt: &[u8],
    m_cost_kib: u32,
    t_cost: u32,
    p_cost: u32,
) -> Result<KeyMaterial, CryptoError> {
    let params = Params::new(m_cost_kib, t_cost, p_cost, Some(KEY_LEN))
        .map_err(|e| CryptoError::KdfFail(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| CryptoError::KdfFail(e.to_string()))?;
    Ok(KeyMaterial(out))
}

/// HKDF-SHA256 single-label expansion. `info` binds the output to a single
/// purpose so the same `ikm`/`salt` pair can yield several unrelated keys.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<KeyMaterial, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut out = [0u8; KEY_LEN];
    hk.expand(info, &mut out)
        .map_err(|_| CryptoError::KdfFail("hkdf expand failed".into()))?;
    Ok(KeyMaterial(out))
}

/// Authenticated-encrypts `plaintext` under `key` with `aad`, drawing a
/// fresh random nonce. Returns `(nonce, ciphertext_with_tag)`.
pub fn aead_seal(
    key: &KeyMaterial,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let nonce = random_nonce()?;
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let ct = cipher
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AuthFail)?;
    Ok((nonce.to_vec(), ct))
}

/// Authenticated-decrypts `ciphertext_with_tag` under `key`/`nonce`/`aad`.
/// A mismatched key, nonce, aad, or a tampered ciphertext all surface as
/// `CryptoError::AuthFail`, indistinguishably.
pub fn aead_open(
    key: &KeyMaterial,
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::AuthFail);
    }
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let pt = cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthFail)?;
    Ok(Zeroizing::new(pt))
}

/// Constant-time equality, irrespective of whether the inputs are the same
/// length (a length mismatch is itself treated as "not equal" without a
/// short-circuiting branch on the *content* comparison).
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
