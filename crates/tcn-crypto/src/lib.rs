//! Temporary Contact Number Cryptographic Primitives
//!
//! Building blocks for decentralized proximity tracing. Pure functions with
//! deterministic outputs. Callers provide key entropy so every operation can
//! be tested deterministically.
//!
//! # Key Lifecycle
//!
//! A device mints one report authorization key per installation. From it a
//! one-way ratchet derives a temporary contact key per 15-minute period,
//! and each temporary contact key yields the number broadcast during that
//! period.
//!
//! ```text
//! Report Authorization Key (Ed25519)
//!        │
//!        ▼
//! HKDF → Temporary Contact Key [0]
//!        │
//!        ▼
//! Ratchet (once per period) → Temporary Contact Key [i]
//!        │
//!        ▼
//! HMAC → Temporary Contact Number [i] (broadcast)
//! ```
//!
//! When a user tests positive, the device signs a report disclosing the
//! temporary contact key at the start of the infectious window. Peers verify
//! the signature, regenerate the disclosed numbers and compare them with the
//! numbers they observed.
//!
//! # Security
//!
//! Forward Secrecy:
//! - Ratchet steps are one-way: a captured key reveals later numbers only
//! - Broadcast numbers come from a separate HMAC and do not reveal the key
//!
//! Unlinkability:
//! - Numbers from different periods are unlinkable until a report discloses
//!   them
//! - Reports disclose a bounded window (14 days), never the authorization
//!   key
//!
//! Authenticity:
//! - Ed25519 signature over the canonical report encoding
//! - Strict verification rejects malleable signatures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chain;
pub mod error;
pub mod report;

pub use chain::{
    AUTHORIZATION_KEY_LEN, REPORT_VERIFICATION_KEY_LEN, ReportAuthorizationKey,
    ReportVerificationKey, TCK_LEN, TCN_LEN, TemporaryContactKey, TemporaryContactNumber,
};
pub use error::TcnError;
pub use report::{
    MAX_MEMO_LEN, MAX_REPORT_PERIODS, Memo, MemoType, PERIOD_MINUTES, Report, SignedReport,
    TemporaryContactNumbers, lookback_start,
};
