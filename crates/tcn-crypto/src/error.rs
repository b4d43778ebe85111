//! Error types for ratchet chain and report operations

use thiserror::Error;

/// Errors from chain, report and codec operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TcnError {
    /// Report range is inverted
    #[error("invalid report range: start {start} > end {end}")]
    InvalidRange {
        /// Requested start index
        start: u16,
        /// Requested end index
        end: u16,
    },

    /// Report range spans more periods than the retrospective window allows
    #[error("report range too long: {periods} periods, max {max}")]
    RangeTooLong {
        /// `end - start` of the requested range
        periods: u16,
        /// Maximum allowed `end - start`
        max: u16,
    },

    /// Ratchet reached the last representable index
    ///
    /// The caller must mint a new authorization key and restart at index 0.
    #[error("ratchet chain exhausted at index {index}")]
    ChainExhausted {
        /// Index of the final key in the chain
        index: u16,
    },

    /// Memo payload does not fit the one-byte length prefix
    #[error("memo too long: {actual} bytes, max {max}")]
    MemoTooLong {
        /// Provided memo length
        actual: usize,
        /// Maximum memo length
        max: usize,
    },

    /// Fixed-size value had the wrong length
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected byte length
        expected: usize,
        /// Actual byte length
        actual: usize,
    },

    /// Wire bytes could not be decoded
    #[error("decode error: {0}")]
    Decode(&'static str),

    /// Embedded report verification key is not a valid Ed25519 point
    #[error("invalid report verification key")]
    InvalidVerificationKey,
}

impl TcnError {
    /// Returns true if this error is fatal for the value being processed.
    ///
    /// Malformed input can never become valid by retrying. Chain exhaustion
    /// is a policy condition: the caller recovers by rotating the key.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidLength { .. } | Self::Decode(_) | Self::InvalidVerificationKey => true,

            Self::InvalidRange { .. }
            | Self::RangeTooLong { .. }
            | Self::ChainExhausted { .. }
            | Self::MemoTooLong { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_input_is_fatal() {
        assert!(TcnError::Decode("short report").is_fatal());
        assert!(TcnError::InvalidLength { expected: 16, actual: 3 }.is_fatal());
        assert!(TcnError::InvalidVerificationKey.is_fatal());
    }

    #[test]
    fn exhaustion_is_not_fatal() {
        assert!(!TcnError::ChainExhausted { index: u16::MAX }.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = TcnError::InvalidRange { start: 10, end: 2 };
        assert_eq!(err.to_string(), "invalid report range: start 10 > end 2");

        let err = TcnError::RangeTooLong { periods: 2000, max: 1344 };
        assert_eq!(err.to_string(), "report range too long: 2000 periods, max 1344");
    }
}
