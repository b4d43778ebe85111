#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tcn_crypto::AUTHORIZATION_KEY_LEN;
use zeroize::Zeroizing;

use super::{SecretKeyStore, StoredTemporaryKey, TemporaryKeyStore};
use crate::error::KeyStoreError;

/// In-memory secret store
///
/// Can be switched to "unavailable" to exercise the fresh-key fallback, the
/// way a locked keychain behaves before first unlock.
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    keys: Arc<Mutex<HashMap<String, Zeroizing<[u8; AUTHORIZATION_KEY_LEN]>>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemorySecretStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// True if a key is stored under `account`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn contains(&self, account: &str) -> bool {
        self.keys.lock().expect("Mutex poisoned").contains_key(account)
    }

    fn check_available(&self) -> Result<(), KeyStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KeyStoreError::Unavailable("secret store locked".to_string()));
        }
        Ok(())
    }
}

impl SecretKeyStore for MemorySecretStore {
    #[allow(clippy::expect_used)]
    fn read_key(
        &self,
        account: &str,
    ) -> Result<Option<Zeroizing<[u8; AUTHORIZATION_KEY_LEN]>>, KeyStoreError> {
        self.check_available()?;
        Ok(self.keys.lock().expect("Mutex poisoned").get(account).cloned())
    }

    #[allow(clippy::expect_used)]
    fn store_key(
        &self,
        key: &[u8; AUTHORIZATION_KEY_LEN],
        account: &str,
    ) -> Result<(), KeyStoreError> {
        self.check_available()?;
        self.keys.lock().expect("Mutex poisoned").insert(account.to_string(), Zeroizing::new(*key));
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn delete_key(&self, account: &str) -> Result<(), KeyStoreError> {
        self.check_available()?;
        self.keys.lock().expect("Mutex poisoned").remove(account);
        Ok(())
    }
}

/// In-memory temporary key store
#[derive(Clone, Default)]
pub struct MemoryTemporaryKeyStore {
    key: Arc<Mutex<Option<StoredTemporaryKey>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryTemporaryKeyStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), KeyStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KeyStoreError::Unavailable("temporary key store offline".to_string()));
        }
        Ok(())
    }
}

impl TemporaryKeyStore for MemoryTemporaryKeyStore {
    #[allow(clippy::expect_used)]
    fn load(&self) -> Result<Option<StoredTemporaryKey>, KeyStoreError> {
        self.check_available()?;
        Ok(self.key.lock().expect("Mutex poisoned").clone())
    }

    #[allow(clippy::expect_used)]
    fn store(&self, key: StoredTemporaryKey) -> Result<(), KeyStoreError> {
        self.check_available()?;
        *self.key.lock().expect("Mutex poisoned") = Some(key);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn clear(&self) -> Result<(), KeyStoreError> {
        self.check_available()?;
        *self.key.lock().expect("Mutex poisoned") = None;
        Ok(())
    }
}
