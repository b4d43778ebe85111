//! Report signing and verification

use ed25519_dalek::{Signature, VerifyingKey};

use super::{MAX_REPORT_PERIODS, Memo, Report, SIGNATURE_LEN};
use crate::{chain::ReportAuthorizationKey, error::TcnError};

/// A report plus the authorization key's signature over its encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedReport {
    report: Report,
    signature: Signature,
}

impl SignedReport {
    pub(crate) fn from_parts(report: Report, signature: [u8; SIGNATURE_LEN]) -> Self {
        Self { report, signature: Signature::from_bytes(&signature) }
    }

    /// Signed contents.
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Raw signature bytes.
    pub fn signature_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.signature.to_bytes()
    }

    /// Check the signature against the embedded verification key.
    ///
    /// A bad signature is an ordinary `Ok(false)`. Only a verification key
    /// that is not a valid curve point is an error.
    pub fn verify(&self) -> Result<bool, TcnError> {
        let verifying_key = VerifyingKey::from_bytes(self.report.verification_key().as_bytes())
            .map_err(|_| TcnError::InvalidVerificationKey)?;

        let message = self.report.to_bytes();
        Ok(verifying_key.verify_strict(&message, &self.signature).is_ok())
    }
}

/// Start of the retrospective window ending at `end_index`.
///
/// `max(0, end_index - lookback_periods)`.
pub fn lookback_start(end_index: u16, lookback_periods: u16) -> u16 {
    end_index.saturating_sub(lookback_periods)
}

impl ReportAuthorizationKey {
    /// Sign a disclosure of chain positions `[start_index, end_index]`.
    ///
    /// # Errors
    ///
    /// - `InvalidRange` if `start_index > end_index`
    /// - `RangeTooLong` if the range exceeds [`MAX_REPORT_PERIODS`]
    ///
    /// Both are checked before anything is signed.
    pub fn create_signed_report(
        &self,
        memo: Memo,
        start_index: u16,
        end_index: u16,
    ) -> Result<SignedReport, TcnError> {
        if start_index > end_index {
            return Err(TcnError::InvalidRange { start: start_index, end: end_index });
        }
        let periods = end_index - start_index;
        if periods > MAX_REPORT_PERIODS {
            return Err(TcnError::RangeTooLong { periods, max: MAX_REPORT_PERIODS });
        }

        let start_key = self.temporary_contact_key_at(start_index);
        let report = Report::new(&start_key, end_index, memo)?;
        let signature = self.sign(&report.to_bytes());

        Ok(SignedReport { report, signature })
    }
}
