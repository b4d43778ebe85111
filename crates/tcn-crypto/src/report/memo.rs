//! Report memo: a tagged opaque payload carried inside a signed report

use crate::error::TcnError;

/// Maximum memo payload, bounded by the one-byte length prefix
pub const MAX_MEMO_LEN: usize = u8::MAX as usize;

/// Memo format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoType {
    /// CoEpi application memo
    CoEpiV1,
    /// Covid Watch application memo (pseudonymous user id)
    CovidWatchV1,
    /// Reserved for future extension
    Reserved,
    /// Any other tag; preserved so foreign reports still decode
    Other(u8),
}

impl From<u8> for MemoType {
    fn from(tag: u8) -> Self {
        match tag {
            0x00 => Self::CoEpiV1,
            0x01 => Self::CovidWatchV1,
            0xff => Self::Reserved,
            other => Self::Other(other),
        }
    }
}

impl From<MemoType> for u8 {
    fn from(memo_type: MemoType) -> Self {
        match memo_type {
            MemoType::CoEpiV1 => 0x00,
            MemoType::CovidWatchV1 => 0x01,
            MemoType::Reserved => 0xff,
            MemoType::Other(tag) => tag,
        }
    }
}

/// Tagged memo payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Memo {
    memo_type: MemoType,
    data: Vec<u8>,
}

impl Memo {
    /// Build a memo, rejecting payloads over [`MAX_MEMO_LEN`].
    pub fn new(memo_type: MemoType, data: impl Into<Vec<u8>>) -> Result<Self, TcnError> {
        let data = data.into();
        if data.len() > MAX_MEMO_LEN {
            return Err(TcnError::MemoTooLong { actual: data.len(), max: MAX_MEMO_LEN });
        }
        Ok(Self { memo_type, data })
    }

    /// Memo carrying a pseudonymous user id, as the Covid Watch format does.
    pub fn covid_watch(user_id: &str) -> Result<Self, TcnError> {
        Self::new(MemoType::CovidWatchV1, user_id.as_bytes())
    }

    /// Format tag.
    pub fn memo_type(&self) -> MemoType {
        self.memo_type
    }

    /// Raw payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload as text, replacing invalid UTF-8.
    pub fn data_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}
