//! Additional Authenticated Data: versioned labels binding a ciphertext to
//! its `(user_id, vault_id, purpose)` context. Computed on demand, never
//! stored raw — only the `(user_id, vault_id, Label)` triple is persisted,
//! so a tampered stored label can only ever name a recognized `Label`
//! variant (the type itself forbids a downgrade to an unversioned label).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    WmkV1,
    ManifestV1,
    PinMakV1,
}

impl Label {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Label::WmkV1 => "wmk_v1",
            Label::ManifestV1 => "manifest_v1",
            Label::PinMakV1 => "pin_mak_v1",
        }
    }
}

/// The `(user_id, vault_id)` pair an `AadContext` is scoped to. Stored
/// alongside the `Keystore`/`PinStore` so AAD can be recomputed on demand at
/// seal/open time without ever persisting the computed string itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AadContext {
    pub user_id: String,
    pub vault_id: String,
}

impl AadContext {
    #[must_use]
    pub fn new(user_id: impl Into<String>, vault_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            vault_id: vault_id.into(),
        }
    }

    /// Computes `user_id "|" vault_id "|" label` for a recognized `Label`.
    /// There is no way to construct an AAD string for a label outside the
    /// enum — the type system is the enforcement of spec §6.4's "refuse
    /// AEAD operations with a label it does not recognize".
    #[must_use]
    pub fn compute(&self, label: Label) -> Vec<u8> {
        format!("{}|{}|{}", self.user_id, self.vault_id, label.as_str()).into_bytes()
    }
}
