//! The secure local key-value storage boundary (spec §6.5). This crate
//! never decides how bytes reach disk/extension storage/keychain — it only
//! asks for them back by key.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The five keys this crate reads/writes, named so callers don't have to
/// guess at string literals scattered through the orchestrator.
pub mod keys {
    pub const KEYSTORE: &str = "keystore";
    pub const PIN_STORE: &str = "pin_store";
    pub const LOCK_STATE: &str = "lock_state";
    pub const IS_SOFT_LOCKED: &str = "is_locked";
    pub const SESSION: &str = "session";
}

#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Reference implementation for tests and embedding examples. Not durable
/// across process restarts by design — a real platform backend is expected
/// to supply its own.
#[derive(Default)]
pub struct InMemorySecureStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemorySecureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for InMemorySecureStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = InMemorySecureStore::new();
        store.set(keys::KEYSTORE, b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get(keys::KEYSTORE).await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn get_on_missing_key_is_none() {
        let store = InMemorySecureStore::new();
        assert_eq!(store.get(keys::PIN_STORE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_the_value() {
        let store = InMemorySecureStore::new();
        store.set(keys::SESSION, b"token".to_vec()).await.unwrap();
        store.delete(keys::SESSION).await.unwrap();
        assert_eq!(store.get(keys::SESSION).await.unwrap(), None);
    }
}
