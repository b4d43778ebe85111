//! Ratchet chain: from an authorization key to rotating broadcast numbers
//!
//! ```text
//! ReportAuthorizationKey (Ed25519 secret + rvk)
//!        │
//!        ▼ HKDF(salt = rvk)
//! tck[0]
//!        │
//!        ▼ HMAC(tck[i], "H_TCK" || rvk)
//! tck[1] ─► tck[2] ─► ... ─► tck[65535]
//!        │
//!        ▼ HMAC(tck[i], "H_TCN" || le_u16(i) || rvk)[..16]
//! tcn[i]
//! ```
//!
//! A device advertises `tcn[i]` during period `i` and ratchets once per
//! period. Disclosing `tck[s]` lets anyone regenerate `tcn[s..]`, and nothing
//! earlier.

pub mod derivation;
pub mod keys;
pub mod ratchet;

pub use keys::{
    AUTHORIZATION_KEY_LEN, REPORT_VERIFICATION_KEY_LEN, ReportAuthorizationKey,
    ReportVerificationKey,
};
pub use ratchet::{TemporaryContactKey, TemporaryContactNumber};

/// Length of temporary contact key bytes
pub const TCK_LEN: usize = 32;

/// Length of a broadcast temporary contact number
pub const TCN_LEN: usize = 16;
