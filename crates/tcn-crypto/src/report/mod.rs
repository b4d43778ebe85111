//! Signed reports: range-limited disclosure of a device's broadcast history
//!
//! A report carries the verification key, the temporary contact key at
//! `start_index`, the index range and a memo. Anyone holding a report can
//! regenerate every number broadcast in `[start_index, end_index]`; the
//! Ed25519 signature over the report encoding proves the disclosure came
//! from the holder of the authorization key.
//!
//! # Invariants
//!
//! - `start_index <= end_index`, enforced at construction and decode
//! - Freshly built reports span at most [`MAX_REPORT_PERIODS`] steps
//! - Signed reports are immutable; there is no setter on any field

pub mod codec;
pub mod expand;
pub mod memo;
pub mod signed;

pub use codec::{REPORT_HEADER_LEN, SIGNATURE_LEN};
pub use expand::TemporaryContactNumbers;
pub use memo::{MAX_MEMO_LEN, Memo, MemoType};
pub use signed::{SignedReport, lookback_start};

use crate::{
    chain::{ReportVerificationKey, TCK_LEN, TemporaryContactKey},
    error::TcnError,
};

/// Broadcast period length in minutes
pub const PERIOD_MINUTES: u16 = 15;

/// Periods in the 14-day retrospective window (`60 * 24 * 14 / 15`)
pub const MAX_REPORT_PERIODS: u16 = 60 * 24 * 14 / PERIOD_MINUTES;

/// Unsigned report contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    verification_key: ReportVerificationKey,
    start_key_bytes: [u8; TCK_LEN],
    start_index: u16,
    end_index: u16,
    memo: Memo,
}

impl Report {
    /// Build a report starting at `start_key`.
    ///
    /// Rejects inverted ranges. The retrospective window is a signing
    /// policy, checked by the builder rather than here, so reports from
    /// peers with a different policy still decode.
    pub fn new(start_key: &TemporaryContactKey, end_index: u16, memo: Memo) -> Result<Self, TcnError> {
        let start_index = start_key.index();
        if start_index > end_index {
            return Err(TcnError::InvalidRange { start: start_index, end: end_index });
        }

        Ok(Self {
            verification_key: start_key.verification_key(),
            start_key_bytes: *start_key.bytes(),
            start_index,
            end_index,
            memo,
        })
    }

    /// Verification key of the reporting device.
    pub fn verification_key(&self) -> ReportVerificationKey {
        self.verification_key
    }

    /// First disclosed chain position.
    pub fn start_index(&self) -> u16 {
        self.start_index
    }

    /// Last disclosed chain position (inclusive).
    pub fn end_index(&self) -> u16 {
        self.end_index
    }

    /// Attached memo.
    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    /// Number of disclosed periods (`end - start + 1`).
    pub fn period_count(&self) -> usize {
        usize::from(self.end_index - self.start_index) + 1
    }

    /// Temporary contact key at `start_index`.
    pub fn start_key(&self) -> TemporaryContactKey {
        TemporaryContactKey::new(self.start_index, self.verification_key, self.start_key_bytes)
    }

    /// Lazily regenerate every disclosed broadcast number, in index order.
    ///
    /// Each call starts a fresh pass. Memory use is one key regardless of the
    /// range length.
    pub fn temporary_contact_numbers(&self) -> TemporaryContactNumbers {
        TemporaryContactNumbers::new(self.start_key(), self.end_index)
    }
}
