//! The in-process holder of the Master Access Key: the one thing in this
//! crate that, once installed, must never be handed out by value.

use crate::aad::AadContext;
use crate::crypto::KeyMaterial;
use serde::{Deserialize, Serialize};

pub struct Keystore {
    mak: KeyMaterial,
    aad: AadContext,
}

impl Keystore {
    #[must_use]
    pub fn new(mak: KeyMaterial, aad: AadContext) -> Self {
        Self { mak, aad }
    }

    /// Scoped access to the raw key bytes. There is deliberately no
    /// `mak(&self) -> KeyMaterial` — every caller works inside this
    /// closure instead of taking ownership of a copy.
    pub fn with_mak<R>(&self, f: impl FnOnce(&[u8; 32]) -> R) -> R {
        f(self.mak.as_bytes())
    }

    #[must_use]
    pub fn aad(&self) -> &AadContext {
        &self.aad
    }

    #[must_use]
    pub fn to_persisted(&self) -> PersistedKeystore {
        PersistedKeystore {
            mak: self.mak.as_bytes().to_vec(),
            aad: self.aad.clone(),
        }
    }

    #[must_use]
    pub fn from_persisted(persisted: PersistedKeystore) -> Option<Self> {
        if persisted.mak.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&persisted.mak);
        Some(Self {
            mak: KeyMaterial(bytes),
            aad: persisted.aad,
        })
    }
}

/// Byte-identical wire form of a `Keystore`, for platforms that must
/// persist it across process suspensions (spec §4.7). Erased via
/// `SecureStore::delete` whenever the orchestrator transitions out of
/// `Unlocked`.
#[derive(Serialize, Deserialize)]
pub struct PersistedKeystore {
    pub mak: Vec<u8>,
    pub aad: AadContext,
}
