//! Key persistence collaborators
//!
//! Two stores with different trust levels:
//!
//! - [`SecretKeyStore`] holds the report authorization key. It is the only
//!   place the key exists at rest; the session reads it immediately before
//!   use and drops it afterwards.
//! - [`TemporaryKeyStore`] holds the committed chain position. The ratchet is
//!   one-way, so this value cannot be turned back into the authorization key
//!   and may live in ordinary local storage.
//!
//! Both are single-writer resources. The session serializes every mutation
//! behind its key lock.

mod memory;

use std::fmt;

pub use memory::{MemorySecretStore, MemoryTemporaryKeyStore};
use tcn_crypto::{
    AUTHORIZATION_KEY_LEN, ReportVerificationKey, TCK_LEN, TemporaryContactKey,
};
use zeroize::Zeroizing;

use crate::error::KeyStoreError;

/// Account name under which the authorization key is stored
pub const AUTHORIZATION_KEY_ACCOUNT: &str = "tcn-rak";

/// Protected store for secret key material.
pub trait SecretKeyStore: Clone + Send + Sync + 'static {
    /// Key stored under `account`, or `None` if there is none.
    fn read_key(
        &self,
        account: &str,
    ) -> Result<Option<Zeroizing<[u8; AUTHORIZATION_KEY_LEN]>>, KeyStoreError>;

    /// Store `key` under `account`, replacing any previous key.
    fn store_key(&self, key: &[u8; AUTHORIZATION_KEY_LEN], account: &str)
    -> Result<(), KeyStoreError>;

    /// Delete the key under `account`. Deleting a missing key succeeds.
    fn delete_key(&self, account: &str) -> Result<(), KeyStoreError>;
}

/// A committed chain position plus the time it was committed.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredTemporaryKey {
    /// Chain index.
    pub index: u16,
    /// Verification key of the authorization key that owns the chain.
    pub verification_key: ReportVerificationKey,
    /// Temporary contact key bytes at `index`.
    pub key_bytes: [u8; TCK_LEN],
    /// Unix seconds when this position was committed.
    pub rotated_at_secs: u64,
}

impl StoredTemporaryKey {
    /// Snapshot `key` as committed at `rotated_at_secs`.
    pub fn new(key: &TemporaryContactKey, rotated_at_secs: u64) -> Self {
        Self {
            index: key.index(),
            verification_key: key.verification_key(),
            key_bytes: *key.bytes(),
            rotated_at_secs,
        }
    }

    /// Rebuild the chain key.
    pub fn to_key(&self) -> TemporaryContactKey {
        TemporaryContactKey::new(self.index, self.verification_key, self.key_bytes)
    }
}

impl fmt::Debug for StoredTemporaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredTemporaryKey")
            .field("index", &self.index)
            .field("verification_key", &self.verification_key)
            .field("rotated_at_secs", &self.rotated_at_secs)
            .finish_non_exhaustive()
    }
}

/// Plain local store for the committed chain position.
pub trait TemporaryKeyStore: Clone + Send + Sync + 'static {
    /// Committed position, if any.
    fn load(&self) -> Result<Option<StoredTemporaryKey>, KeyStoreError>;

    /// Commit `key`. Readers see either the old or the new value.
    fn store(&self, key: StoredTemporaryKey) -> Result<(), KeyStoreError>;

    /// Forget the committed position.
    fn clear(&self) -> Result<(), KeyStoreError>;
}
