//! Binary wire format for reports
//!
//! Layout (integers little-endian, no padding):
//!
//! ```text
//! offset  size  field
//! 0       32    report verification key
//! 32      32    temporary contact key bytes at start_index
//! 64      2     start_index
//! 66      2     end_index
//! 68      1     memo type
//! 69      1     memo length (n)
//! 70      n     memo data
//! 70+n    64    Ed25519 signature over bytes [0, 70+n)   (signed form only)
//! ```
//!
//! Decoding is exact: truncated input, memo length overruns and trailing
//! bytes are all rejected.

use bytes::{Buf, BufMut};

use super::{Memo, MemoType, Report, SignedReport};
use crate::{
    chain::{REPORT_VERIFICATION_KEY_LEN, ReportVerificationKey, TCK_LEN},
    error::TcnError,
};

/// Fixed-size prefix of an encoded report (everything before memo data)
pub const REPORT_HEADER_LEN: usize = REPORT_VERIFICATION_KEY_LEN + TCK_LEN + 2 + 2 + 1 + 1;

/// Length of the trailing Ed25519 signature
pub const SIGNATURE_LEN: usize = 64;

impl Report {
    /// Exact encoded size.
    pub fn encoded_len(&self) -> usize {
        REPORT_HEADER_LEN + self.memo.data().len()
    }

    /// Append the canonical encoding to `dst`.
    ///
    /// This is the exact byte string the signature covers.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(self.verification_key.as_bytes());
        dst.put_slice(&self.start_key_bytes);
        dst.put_u16_le(self.start_index);
        dst.put_u16_le(self.end_index);
        dst.put_u8(self.memo.memo_type().into());
        // Memo::new bounds the payload at u8::MAX
        dst.put_u8(self.memo.data().len() as u8);
        dst.put_slice(self.memo.data());
    }

    /// Canonical encoding as an owned buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Decode an unsigned report, rejecting trailing bytes.
    pub fn decode(src: &[u8]) -> Result<Self, TcnError> {
        let mut buf = src;
        let report = Self::decode_from(&mut buf)?;
        if buf.has_remaining() {
            return Err(TcnError::Decode("trailing bytes after report"));
        }
        Ok(report)
    }

    /// Decode a report from the front of `buf`, advancing past it.
    fn decode_from(buf: &mut &[u8]) -> Result<Self, TcnError> {
        if buf.remaining() < REPORT_HEADER_LEN {
            return Err(TcnError::Decode("report shorter than fixed header"));
        }

        let mut rvk = [0u8; REPORT_VERIFICATION_KEY_LEN];
        buf.copy_to_slice(&mut rvk);
        let mut start_key_bytes = [0u8; TCK_LEN];
        buf.copy_to_slice(&mut start_key_bytes);
        let start_index = buf.get_u16_le();
        let end_index = buf.get_u16_le();
        let memo_type = MemoType::from(buf.get_u8());
        let memo_len = usize::from(buf.get_u8());

        if buf.remaining() < memo_len {
            return Err(TcnError::Decode("memo length exceeds remaining bytes"));
        }
        let data = buf[..memo_len].to_vec();
        buf.advance(memo_len);

        if start_index > end_index {
            return Err(TcnError::InvalidRange { start: start_index, end: end_index });
        }

        Ok(Self {
            verification_key: ReportVerificationKey::from_bytes(rvk),
            start_key_bytes,
            start_index,
            end_index,
            memo: Memo::new(memo_type, data)?,
        })
    }
}

impl SignedReport {
    /// Exact encoded size.
    pub fn encoded_len(&self) -> usize {
        self.report().encoded_len() + SIGNATURE_LEN
    }

    /// Append report encoding followed by the signature.
    pub fn encode(&self, dst: &mut impl BufMut) {
        self.report().encode(dst);
        dst.put_slice(&self.signature_bytes());
    }

    /// Wire form for upload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Parse a downloaded report.
    ///
    /// Only structure is checked here; call [`SignedReport::verify`] before
    /// trusting the contents.
    pub fn from_bytes(src: &[u8]) -> Result<Self, TcnError> {
        let mut buf = src;
        let report = Report::decode_from(&mut buf)?;

        if buf.remaining() != SIGNATURE_LEN {
            return Err(TcnError::InvalidLength {
                expected: report.encoded_len() + SIGNATURE_LEN,
                actual: src.len(),
            });
        }
        let mut signature = [0u8; SIGNATURE_LEN];
        buf.copy_to_slice(&mut signature);

        Ok(Self::from_parts(report, signature))
    }
}
