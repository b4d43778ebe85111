//! Device-side protocol engine for temporary contact numbers
//!
//! Everything a device needs around the pure primitives in [`tcn_crypto`]:
//!
//! - [`Session`]: explicit context object owning the key stores, user id and
//!   local "tested positive" status, and serializing every chain mutation
//! - [`ContactObserver`]: bridge the radio layer calls with what it heard and
//!   asks for what to advertise
//! - [`ExposureCheck`]: the cancellable download → verify → match → flag →
//!   notify pipeline
//!
//! Collaborators (contact database, keychain, network) sit behind traits with
//! in-memory implementations for tests and simulation.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  heard bytes   ┌─────────────────┐   upsert   ┌──────────────┐
//! │ radio scan │ ─────────────► │ ContactObserver │ ─────────► │ ContactStore │
//! └────────────┘                └─────────────────┘            └──────────────┘
//!                                        │ rotate                      ▲
//!                                        ▼                             │ mark_infectious
//! ┌────────────────┐            ┌─────────────────┐            ┌───────┴───────┐
//! │ SecretKeyStore │ ◄───────── │     Session     │ ◄───────── │ ExposureCheck │
//! │ TemporaryKey.. │            └─────────────────┘            └───────┬───────┘
//! └────────────────┘                                                   │
//!                                                          ReportTransport
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cancel;
pub mod config;
pub mod env;
pub mod error;
pub mod keystore;
pub mod matcher;
pub mod observer;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod system_env;
pub mod transport;
pub mod update;

pub use cancel::CancellationFlag;
pub use config::{CheckConfig, DEFAULT_CHUNK_SIZE, PERIOD_SECS, SessionConfig};
pub use env::Environment;
pub use error::{CheckError, KeyStoreError, ObserveError, SessionError, TransportError};
pub use keystore::{
    AUTHORIZATION_KEY_ACCOUNT, MemorySecretStore, MemoryTemporaryKeyStore, SecretKeyStore,
    StoredTemporaryKey, TemporaryKeyStore,
};
pub use matcher::{Admission, Contact, ExposureMatcher, contact_for_report, find_matches};
pub use observer::ContactObserver;
pub use pipeline::{CheckHandle, CheckOutcome, ExposureCheck};
pub use session::{Rotation, Session};
pub use storage::{
    ChaoticContactStore, ContactRecord, ContactStore, MemoryContactStore, RecordId, StorageError,
};
pub use system_env::SystemEnv;
pub use transport::{MemoryTransport, ReportTransport};
pub use update::{ChunkedUpdate, UpdateGate, mark_infectious_chunked};
