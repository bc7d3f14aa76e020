//! Error kinds surfaced by the LockMark core.
//!
//! Every failure mode named in the design is its own variant — `AuthFail`
//! from the AEAD layer never escapes this crate directly; callers in
//! `wmk.rs`, `pin.rs` and `manifest.rs` translate it into the domain error
//! appropriate for that boundary so a tag mismatch can't be distinguished
//! from, say, a malformed blob by an external observer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LockMarkError>;

#[derive(Debug, Error)]
pub enum LockMarkError {
    #[error("wrong password")]
    WrongPassword,

    #[error("wrong pin")]
    WrongPin,

    #[error("vault is hard-locked")]
    HardLocked,

    #[error("pin quick-unlock is not configured")]
    NotConfigured,

    #[error("master key generated but upload to server failed")]
    WmkUploadFailed { is_first_unlock: bool },

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("local storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("session expired")]
    SessionExpired,

    #[error("internal error: {0}")]
    Internal(String),
}

impl LockMarkError {
    /// The single neutral message an extension UI should show for a failed
    /// unlock, so that `WrongPassword` and `Malformed` are indistinguishable
    /// to whoever is looking at the screen (resists oracle attacks).
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::WrongPassword | Self::Malformed(_) => "Invalid or expired credentials",
            Self::WrongPin => "Incorrect PIN",
            Self::HardLocked => "Too many failed attempts. Enter your password to continue.",
            Self::NotConfigured => "PIN quick-unlock is not set up",
            Self::WmkUploadFailed { .. } => "Unlocked, but syncing with the server failed",
            Self::StorageUnavailable(_) => "Local storage is unavailable",
            Self::SessionExpired => "Your session has expired. Please sign in again.",
            Self::Internal(_) => "Something went wrong",
        }
    }
}

/// Internal AEAD/KDF failures, never exposed outside this crate.
#[derive(Debug, Error)]
pub(crate) enum CryptoError {
    #[error("authentication failed")]
    AuthFail,
    #[error("invalid kdf parameters: {0}")]
    KdfFail(String),
    #[error("csprng unavailable: {0}")]
    RngFail(String),
}

impl From<CryptoError> for LockMarkError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthFail => LockMarkError::Malformed("authentication failed".into()),
            CryptoError::KdfFail(msg) => LockMarkError::Internal(format!("kdf: {msg}")),
            CryptoError::RngFail(msg) => LockMarkError::Internal(format!("rng: {msg}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local storage unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Codec(String),
}

impl From<StoreError> for LockMarkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => LockMarkError::StorageUnavailable(msg),
            StoreError::Codec(msg) => LockMarkError::Malformed(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("server rejected the request: {0}")]
    Rejected(String),
}
