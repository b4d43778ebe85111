//! Error types for the device-side protocol engine.
//!
//! Each collaborator has its own error type so hosts can map failures of
//! their keychain, database and network separately. The exposure pipeline
//! folds them into [`CheckError`], a single terminal failure per run.

use tcn_crypto::TcnError;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors from the secret or temporary key store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// The store could not be read or written
    ///
    /// Recoverable: the session falls back to a freshly minted key.
    #[error("key store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the report upload/download collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request could not be delivered or the peer did not answer.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Peer answered with something other than success.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// Payload could not be encoded for sending.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// Errors from session key operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Temporary key store failure
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    /// Chain or report construction failure
    #[error(transparent)]
    Crypto(#[from] TcnError),
}

/// Errors from the scan bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserveError {
    /// Radio payload is not a contact number
    #[error("malformed observation: {0}")]
    Malformed(#[from] TcnError),

    /// Sighting could not be recorded
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Terminal failure of one exposure check run.
///
/// Updates committed before the failure are kept; the next run starts from
/// scratch and re-applies them as no-ops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// Contact store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Upload or download failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Building this device's own report failed
    #[error("crypto error: {0}")]
    Crypto(#[from] TcnError),

    /// Key store failure while building this device's own report
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// The run was cancelled before it finished
    #[error("exposure check cancelled")]
    Cancelled,

    /// The task running the check panicked or was aborted
    #[error("exposure check task failed: {0}")]
    Task(String),
}

impl From<SessionError> for CheckError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::KeyStore(err) => Self::KeyStore(err),
            SessionError::Crypto(err) => Self::Crypto(err),
        }
    }
}

impl CheckError {
    /// Returns true if the next scheduled run may succeed.
    ///
    /// I/O failures and cancellation are transient. A crypto failure while
    /// building the local report (for example an oversized user id) repeats
    /// on every run until the configuration changes.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(_) | Self::Transport(_) | Self::KeyStore(_) | Self::Cancelled => true,
            Self::Crypto(_) | Self::Task(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_are_transient() {
        assert!(CheckError::from(StorageError::Io("disk".into())).is_transient());
        assert!(CheckError::from(TransportError::Connection("offline".into())).is_transient());
        assert!(CheckError::Cancelled.is_transient());
    }

    #[test]
    fn crypto_failures_are_not_transient() {
        let err = CheckError::from(SessionError::Crypto(TcnError::MemoTooLong { actual: 300, max: 255 }));
        assert_eq!(err, CheckError::Crypto(TcnError::MemoTooLong { actual: 300, max: 255 }));
        assert!(!err.is_transient());
    }

    #[test]
    fn session_key_store_errors_keep_their_kind() {
        let err = CheckError::from(SessionError::KeyStore(KeyStoreError::Unavailable("locked".into())));
        assert!(matches!(err, CheckError::KeyStore(_)));
        assert_eq!(err.to_string(), "key store error: key store unavailable: locked");
    }
}
