//! Composes every module behind a single-slot mutex guarding the
//! `Keystore`, realizing spec §5's concurrency model: an in-flight unlock
//! must never let a concurrent unlock observe a half-written Keystore.

use crate::aad::AadContext;
use crate::autolock::{AutoLockCallback, AutoLockConfig, AutoLockService};
use crate::config::CoreConfig;
use crate::crypto::{KeyMaterial, SecretBytes};
use crate::error::{LockMarkError, Result};
use crate::keys::{self, KdfParams};
use crate::keystore::Keystore;
use crate::lock::{LockMachine, LockPhase, LockState};
use crate::manifest::{self, SealedManifest};
use crate::pin::{self, PinStoreData, PinUnlockOutcome};
use crate::server::ServerClient;
use crate::store::{keys as store_keys, SecureStore};
use crate::wmk::{self, WrappedMasterKey};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tokio::task::spawn_blocking;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Everything the caller must supply to identify the vault it's unlocking;
/// distinct from the password itself so the password can stay the sole
/// by-value `SecretBytes` argument.
pub struct UnlockContext {
    pub user_id: String,
    pub vault_id: String,
    pub kdf_params: KdfParams,
    pub wrapped_mk: Option<WrappedMasterKey>,
}

pub struct UnlockOutcome {
    pub is_first_unlock: bool,
}

pub struct Orchestrator {
    keystore: Mutex<Option<Keystore>>,
    lock_phase: RwLock<LockPhase>,
    store: Arc<dyn SecureStore>,
    server: Arc<dyn ServerClient>,
    config: CoreConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn SecureStore>, server: Arc<dyn ServerClient>, config: CoreConfig) -> Self {
        Self {
            keystore: Mutex::new(None),
            lock_phase: RwLock::new(LockPhase::NeverUnlocked),
            store,
            server,
            config,
        }
    }

    pub async fn phase(&self) -> LockPhase {
        *self.lock_phase.read().await
    }

    async fn load_lock_state(&self) -> Result<LockState> {
        match self.store.get(store_keys::LOCK_STATE).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)
                .map_err(|e| LockMarkError::Malformed(format!("corrupt lock_state: {e}")))?),
            None => Ok(LockState::default()),
        }
    }

    async fn save_lock_state(&self, state: &LockState) -> Result<()> {
        let bytes = serde_json::to_vec(state)
            .map_err(|e| LockMarkError::Internal(format!("failed to serialize lock_state: {e}")))?;
        self.store.set(store_keys::LOCK_STATE, bytes).await?;
        Ok(())
    }

    async fn load_pin_store(&self) -> Result<Option<PinStoreData>> {
        match self.store.get(store_keys::PIN_STORE).await? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| LockMarkError::Malformed(format!("corrupt pin_store: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    async fn save_pin_store(&self, store: &PinStoreData) -> Result<()> {
        let bytes = serde_json::to_vec(store)
            .map_err(|e| LockMarkError::Internal(format!("failed to serialize pin_store: {e}")))?;
        self.store.set(store_keys::PIN_STORE, bytes).await?;
        Ok(())
    }

    /// Writes a freshly derived MAK into an *already-held* keystore slot.
    /// Takes the guard by reference rather than locking `self.keystore`
    /// itself, since every caller calls this from inside the single
    /// critical section `unlock`/`unlock_with_pin` already opened — a
    /// second internal lock attempt on the same `tokio::sync::Mutex` would
    /// self-deadlock before ever reaching this line.
    async fn install_keystore(&self, slot: &mut Option<Keystore>, mak: KeyMaterial, aad: AadContext) -> Result<()> {
        let persisted = Keystore::new(mak, aad).to_persisted();
        let bytes = serde_json::to_vec(&persisted)
            .map_err(|e| LockMarkError::Internal(format!("failed to serialize keystore: {e}")))?;
        self.store.set(store_keys::KEYSTORE, bytes).await?;

        let keystore = Keystore::from_persisted(persisted)
            .ok_or_else(|| LockMarkError::Internal("keystore round-trip produced invalid mak".into()))?;
        *slot = Some(keystore);

        *self.lock_phase.write().await = LockMachine::on_password_unlock_success();
        self.store
            .set(store_keys::IS_SOFT_LOCKED, vec![0u8])
            .await?;
        Ok(())
    }

    async fn wipe_keystore(&self) -> Result<()> {
        let mut guard = self.keystore.lock().await;
        *guard = None;
        drop(guard);
        self.store.delete(store_keys::KEYSTORE).await?;
        Ok(())
    }

    /// Password-based unlock, covering both first-unlock (no server-held
    /// WMK yet) and the returning-user path.
    pub async fn unlock(&self, password: SecretBytes, ctx: UnlockContext) -> Result<UnlockOutcome> {
        let mut guard = self.keystore.lock().await;

        let uek = {
            let kdf_params = ctx.kdf_params.clone();
            spawn_blocking(move || keys::derive_uek(&password, &kdf_params))
                .await
                .map_err(|e| LockMarkError::Internal(format!("argon2id task panicked: {e}")))??
        };

        let aad = AadContext::new(ctx.user_id.clone(), ctx.vault_id.clone());

        let (mk, is_first_unlock) = match &ctx.wrapped_mk {
            Some(wrapped) => (wmk::unwrap_master_key(&uek, wrapped, &aad)?, false),
            None => (KeyMaterial::random().map_err(LockMarkError::from)?, true),
        };

        let hkdf_salt = if is_first_unlock {
            if self.config.require_explicit_hkdf_salt_on_write {
                ctx.kdf_params.require_explicit_hkdf_salt()?.to_vec()
            } else {
                ctx.kdf_params.hkdf_salt_for_read().to_vec()
            }
        } else {
            ctx.kdf_params.hkdf_salt_for_read().to_vec()
        };

        let (_kek, mak) = keys::derive_sub_keys(&mk, &hkdf_salt)?;

        if is_first_unlock {
            let wrapped = wmk::wrap_master_key(&uek, &mk, &aad)?;
            if let Err(e) = self.server.upload_wmk(&wrapped.to_base64()).await {
                if matches!(e, crate::error::ServerError::Unauthorized) {
                    // The bearer token the caller handed us was already
                    // revoked. Per spec §9, an "unauthorized" response from
                    // the HTTP layer is mapped to a state-machine transition
                    // rather than a global event: install then immediately
                    // tear down the keystore so the phase lands on
                    // `SoftLocked`, not `Unlocked`.
                    self.install_keystore(&mut *guard, mak, aad).await?;
                    warn!("wmk upload rejected as unauthorized on first unlock: {e}");
                    guard.take();
                    self.store.delete(store_keys::KEYSTORE).await?;
                    *self.lock_phase.write().await = LockMachine::on_soft_lock();
                    self.store.set(store_keys::IS_SOFT_LOCKED, vec![1u8]).await?;
                    return Err(LockMarkError::SessionExpired);
                }
                warn!("wmk upload failed on first unlock: {e}");
                self.install_keystore(&mut *guard, mak, aad).await?;
                return Err(LockMarkError::WmkUploadFailed { is_first_unlock: true });
            }
        }

        self.install_keystore(&mut *guard, mak, aad).await?;
        drop(guard);

        let mut state = LockState::reset();
        state.is_hard_locked = false;
        self.save_lock_state(&state).await?;

        info!(is_first_unlock, "unlock succeeded");
        Ok(UnlockOutcome { is_first_unlock })
    }

    /// Quick unlock from `SoftLocked` via a previously configured PIN.
    pub async fn unlock_with_pin(&self, pin_value: SecretBytes) -> Result<()> {
        let mut guard = self.keystore.lock().await;

        let store = self.load_pin_store().await?;
        let state = self.load_lock_state().await?;

        let decision = pin::unlock_with_pin(
            &pin_value,
            store.as_ref(),
            state.is_hard_locked,
            state.failed_pin_attempts,
            &self.config,
        )?;

        let now = OffsetDateTime::now_utc();
        let mut new_state = state.clone();
        new_state.record_failed_pin_attempt(decision.new_failed_attempts, now);

        if decision.should_delete_pin_store {
            new_state.mark_hard_locked(now);
            self.store.delete(store_keys::PIN_STORE).await?;
        }
        self.save_lock_state(&new_state).await?;

        match decision.outcome {
            PinUnlockOutcome::Unlocked { mak, aad } => {
                self.install_keystore(&mut *guard, mak, aad).await?;
                let reset = LockState::reset();
                self.save_lock_state(&reset).await?;
                Ok(())
            }
            PinUnlockOutcome::WrongPin => Err(LockMarkError::WrongPin),
            PinUnlockOutcome::HardLocked => {
                *self.lock_phase.write().await = LockMachine::on_hard_lock();
                Err(LockMarkError::HardLocked)
            }
        }
    }

    /// Requires the vault to currently be `Unlocked`.
    pub async fn setup_pin(&self, pin_value: SecretBytes) -> Result<()> {
        let guard = self.keystore.lock().await;
        let keystore = guard.as_ref().ok_or(LockMarkError::HardLocked)?;

        let store = keystore.with_mak(|mak_bytes| {
            pin::setup_pin(&pin_value, &KeyMaterial(*mak_bytes), keystore.aad())
        })?;
        drop(guard);

        self.save_pin_store(&store).await
    }

    pub async fn remove_pin(&self) -> Result<()> {
        self.store.delete(store_keys::PIN_STORE).await?;
        Ok(())
    }

    /// `Unlocked → SoftLocked`. `async` because it contends on the same
    /// keystore mutex an in-flight `unlock`/`unlock_with_pin` may be
    /// holding across an `.await` — a blocking acquire here would risk
    /// deadlocking the runtime thread that's also driving that future.
    pub async fn lock(&self) -> Result<()> {
        self.keystore.lock().await.take();
        *self.lock_phase.write().await = LockMachine::on_soft_lock();
        self.store.set(store_keys::IS_SOFT_LOCKED, vec![1u8]).await?;
        Ok(())
    }

    /// Any state → `NeverUnlocked`. Clears every per-user local artifact
    /// except the server-held WMK, which this crate never owns.
    pub async fn logout(&self) -> Result<()> {
        self.wipe_keystore().await?;
        self.store.delete(store_keys::PIN_STORE).await?;
        self.store.delete(store_keys::LOCK_STATE).await?;
        self.store.delete(store_keys::SESSION).await?;
        *self.lock_phase.write().await = LockMachine::on_logout();
        Ok(())
    }

    pub async fn seal_manifest(&self, bytes: &[u8]) -> Result<SealedManifest> {
        let guard = self.keystore.lock().await;
        let keystore = guard.as_ref().ok_or(LockMarkError::HardLocked)?;
        keystore.with_mak(|mak_bytes| manifest::seal_manifest(&KeyMaterial(*mak_bytes), keystore.aad(), bytes))
    }

    pub async fn open_manifest(&self, sealed: &SealedManifest) -> Result<Zeroizing<Vec<u8>>> {
        let guard = self.keystore.lock().await;
        let keystore = guard.as_ref().ok_or(LockMarkError::HardLocked)?;
        keystore.with_mak(|mak_bytes| manifest::open_manifest(&KeyMaterial(*mak_bytes), keystore.aad(), sealed))
    }
}

/// Wires `Orchestrator::lock` into the auto-lock poller's callback
/// boundary, mirroring the teacher's pattern of a thin adapter struct
/// between `AutoLockService` and the thing it actually locks.
pub struct OrchestratorAutoLockCallback {
    orchestrator: Arc<Orchestrator>,
}

impl OrchestratorAutoLockCallback {
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait::async_trait]
impl AutoLockCallback for OrchestratorAutoLockCallback {
    async fn on_auto_lock(&self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.orchestrator
            .lock()
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

#[must_use]
pub fn spawn_auto_lock_service(orchestrator: Arc<Orchestrator>, config: AutoLockConfig) -> AutoLockService {
    let callback = Arc::new(OrchestratorAutoLockCallback::new(orchestrator));
    AutoLockService::new(config, callback, OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KdfParams;
    use crate::server::RecordingServerClient;
    use crate::store::InMemorySecureStore;

    fn test_kdf_params() -> KdfParams {
        KdfParams::fresh(vec![1u8; 16], vec![2u8; 16], 8, 1, 1)
    }

    fn new_orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemorySecureStore::new()),
            Arc::new(RecordingServerClient::new()),
            CoreConfig::default(),
        )
    }

    #[tokio::test]
    async fn first_unlock_installs_keystore_and_uploads_wmk() {
        let orch = new_orchestrator();
        let outcome = orch
            .unlock(
                SecretBytes::from("correct horse battery staple"),
                UnlockContext {
                    user_id: "u_1".into(),
                    vault_id: "v_1".into(),
                    kdf_params: test_kdf_params(),
                    wrapped_mk: None,
                },
            )
            .await
            .unwrap();
        assert!(outcome.is_first_unlock);
        assert_eq!(orch.phase().await, LockPhase::Unlocked);
    }

    #[tokio::test]
    async fn returning_unlock_with_correct_password_succeeds() {
        let orch = new_orchestrator();
        let kdf_params = test_kdf_params();
        let password = SecretBytes::from("correct horse battery staple");

        orch.unlock(
            SecretBytes::from("correct horse battery staple"),
            UnlockContext {
                user_id: "u_1".into(),
                vault_id: "v_1".into(),
                kdf_params: kdf_params.clone(),
                wrapped_mk: None,
            },
        )
        .await
        .unwrap();

        let wrapped_b64 = orch.server.fetch_wmk().await.unwrap().unwrap();
        let wrapped = WrappedMasterKey::from_base64(&wrapped_b64).unwrap();

        orch.logout().await.unwrap();

        let second = orch
            .unlock(
                password,
                UnlockContext {
                    user_id: "u_1".into(),
                    vault_id: "v_1".into(),
                    kdf_params,
                    wrapped_mk: Some(wrapped),
                },
            )
            .await
            .unwrap();
        assert!(!second.is_first_unlock);
        assert_eq!(orch.phase().await, LockPhase::Unlocked);
    }

    #[tokio::test]
    async fn returning_unlock_with_wrong_password_fails() {
        let orch = new_orchestrator();
        let kdf_params = test_kdf_params();

        orch.unlock(
            SecretBytes::from("correct horse battery staple"),
            UnlockContext {
                user_id: "u_1".into(),
                vault_id: "v_1".into(),
                kdf_params: kdf_params.clone(),
                wrapped_mk: None,
            },
        )
        .await
        .unwrap();

        let wrapped_b64 = orch.server.fetch_wmk().await.unwrap().unwrap();
        let wrapped = WrappedMasterKey::from_base64(&wrapped_b64).unwrap();
        orch.logout().await.unwrap();

        let err = orch
            .unlock(
                SecretBytes::from("wrong password"),
                UnlockContext {
                    user_id: "u_1".into(),
                    vault_id: "v_1".into(),
                    kdf_params,
                    wrapped_mk: Some(wrapped),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LockMarkError::WrongPassword));
    }

    #[tokio::test]
    async fn setup_pin_then_lock_then_unlock_with_pin_succeeds() {
        let orch = new_orchestrator();
        orch.unlock(
            SecretBytes::from("correct horse battery staple"),
            UnlockContext {
                user_id: "u_1".into(),
                vault_id: "v_1".into(),
                kdf_params: test_kdf_params(),
                wrapped_mk: None,
            },
        )
        .await
        .unwrap();

        orch.setup_pin(SecretBytes::from("1234")).await.unwrap();
        orch.lock().await.unwrap();

        orch.unlock_with_pin(SecretBytes::from("1234")).await.unwrap();
        assert_eq!(orch.phase().await, LockPhase::Unlocked);
    }

    #[tokio::test]
    async fn three_wrong_pin_attempts_hard_locks_and_deletes_pin_store() {
        let orch = new_orchestrator();
        orch.unlock(
            SecretBytes::from("correct horse battery staple"),
            UnlockContext {
                user_id: "u_1".into(),
                vault_id: "v_1".into(),
                kdf_params: test_kdf_params(),
                wrapped_mk: None,
            },
        )
        .await
        .unwrap();
        orch.setup_pin(SecretBytes::from("1234")).await.unwrap();
        orch.lock().await.unwrap();

        assert!(matches!(
            orch.unlock_with_pin(SecretBytes::from("0000")).await.unwrap_err(),
            LockMarkError::WrongPin
        ));
        assert!(matches!(
            orch.unlock_with_pin(SecretBytes::from("0000")).await.unwrap_err(),
            LockMarkError::WrongPin
        ));
        assert!(matches!(
            orch.unlock_with_pin(SecretBytes::from("0000")).await.unwrap_err(),
            LockMarkError::HardLocked
        ));

        let err = orch.unlock_with_pin(SecretBytes::from("1234")).await.unwrap_err();
        assert!(matches!(err, LockMarkError::NotConfigured));
    }

    #[tokio::test]
    async fn seal_and_open_manifest_roundtrip_while_unlocked() {
        let orch = new_orchestrator();
        orch.unlock(
            SecretBytes::from("correct horse battery staple"),
            UnlockContext {
                user_id: "u_1".into(),
                vault_id: "v_1".into(),
                kdf_params: test_kdf_params(),
                wrapped_mk: None,
            },
        )
        .await
        .unwrap();

        let sealed = orch.seal_manifest(b"bookmarks-go-here").await.unwrap();
        let opened = orch.open_manifest(&sealed).await.unwrap();
        assert_eq!(&opened[..], b"bookmarks-go-here");
    }

    #[tokio::test]
    async fn manifest_operations_fail_while_locked() {
        let orch = new_orchestrator();
        let err = orch.seal_manifest(b"payload").await.unwrap_err();
        assert!(matches!(err, LockMarkError::HardLocked));
    }

    #[tokio::test]
    async fn logout_clears_pin_store_and_lock_state() {
        let orch = new_orchestrator();
        orch.unlock(
            SecretBytes::from("correct horse battery staple"),
            UnlockContext {
                user_id: "u_1".into(),
                vault_id: "v_1".into(),
                kdf_params: test_kdf_params(),
                wrapped_mk: None,
            },
        )
        .await
        .unwrap();
        orch.setup_pin(SecretBytes::from("1234")).await.unwrap();

        orch.logout().await.unwrap();
        assert_eq!(orch.phase().await, LockPhase::NeverUnlocked);

        let err = orch.unlock_with_pin(SecretBytes::from("1234")).await.unwrap_err();
        assert!(matches!(err, LockMarkError::NotConfigured));
    }
}
