//! Temporary contact keys and the numbers they broadcast
//!
//! # Security Properties
//!
//! - Forward only: the next key is an HMAC of the current one, so no
//!   operation recovers index `i` from index `i + 1`
//! - Unlinkable output: broadcast numbers come from a second, differently
//!   labelled HMAC and reveal nothing about the key bytes
//! - Determinism: the same authorization key always yields the same chain

use std::fmt;

use zeroize::Zeroize;

use super::{
    ReportVerificationKey, TCK_LEN, TCN_LEN,
    derivation::{derive_number_bytes, ratchet_key_bytes},
};
use crate::error::TcnError;

/// Rotating identifier broadcast over the air.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemporaryContactNumber([u8; TCN_LEN]);

impl TemporaryContactNumber {
    /// Wrap raw number bytes.
    pub fn from_bytes(bytes: [u8; TCN_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw number bytes.
    pub fn as_bytes(&self) -> &[u8; TCN_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for TemporaryContactNumber {
    type Error = TcnError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; TCN_LEN] = bytes
            .try_into()
            .map_err(|_| TcnError::InvalidLength { expected: TCN_LEN, actual: bytes.len() })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for TemporaryContactNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tcn(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// A position in the ratchet chain.
///
/// Safe to keep in plain storage: it cannot be reversed into the
/// authorization key or into earlier positions.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryContactKey {
    index: u16,
    verification_key: ReportVerificationKey,
    bytes: [u8; TCK_LEN],
}

impl TemporaryContactKey {
    /// Rebuild a key from its persisted parts.
    pub fn new(index: u16, verification_key: ReportVerificationKey, bytes: [u8; TCK_LEN]) -> Self {
        Self { index, verification_key, bytes }
    }

    /// Chain position.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Verification key of the authorization key that rooted this chain.
    pub fn verification_key(&self) -> ReportVerificationKey {
        self.verification_key
    }

    /// Raw key bytes.
    pub fn bytes(&self) -> &[u8; TCK_LEN] {
        &self.bytes
    }

    /// Advance one step.
    ///
    /// The verification key is carried unchanged. Fails with
    /// [`TcnError::ChainExhausted`] at `u16::MAX`.
    pub fn ratchet(&self) -> Result<Self, TcnError> {
        let Some(next_index) = self.index.checked_add(1) else {
            return Err(TcnError::ChainExhausted { index: self.index });
        };

        Ok(Self {
            index: next_index,
            verification_key: self.verification_key,
            bytes: ratchet_key_bytes(&self.bytes, self.verification_key.as_bytes()),
        })
    }

    /// Number broadcast while this key is current.
    pub fn temporary_contact_number(&self) -> TemporaryContactNumber {
        TemporaryContactNumber(derive_number_bytes(
            self.index,
            &self.bytes,
            self.verification_key.as_bytes(),
        ))
    }
}

impl fmt::Debug for TemporaryContactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryContactKey")
            .field("index", &self.index)
            .field("verification_key", &self.verification_key)
            .finish_non_exhaustive()
    }
}

impl Drop for TemporaryContactKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReportAuthorizationKey;

    fn test_chain() -> TemporaryContactKey {
        ReportAuthorizationKey::from_bytes(&[42u8; 32]).initial_temporary_contact_key()
    }

    #[test]
    fn ratchet_increments_index() {
        let key0 = test_chain();
        let key1 = key0.ratchet().unwrap();
        let key2 = key1.ratchet().unwrap();

        assert_eq!(key1.index(), 1);
        assert_eq!(key2.index(), 2);
    }

    #[test]
    fn ratchet_keeps_verification_key() {
        let key0 = test_chain();
        let key1 = key0.ratchet().unwrap();
        assert_eq!(key0.verification_key(), key1.verification_key());
    }

    #[test]
    fn ratchet_produces_new_bytes() {
        let key0 = test_chain();
        let key1 = key0.ratchet().unwrap();
        assert_ne!(key0.bytes(), key1.bytes());
    }

    #[test]
    fn ratchet_is_deterministic() {
        let a = test_chain().ratchet().unwrap().ratchet().unwrap();
        let b = test_chain().ratchet().unwrap().ratchet().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.temporary_contact_number(), b.temporary_contact_number());
    }

    #[test]
    fn ratchet_fails_at_max_index() {
        let key = test_chain();
        let last = TemporaryContactKey::new(u16::MAX, key.verification_key(), *key.bytes());

        assert_eq!(last.ratchet(), Err(TcnError::ChainExhausted { index: u16::MAX }));
    }

    #[test]
    fn penultimate_key_still_ratchets() {
        let key = test_chain();
        let penultimate = TemporaryContactKey::new(u16::MAX - 1, key.verification_key(), *key.bytes());

        assert_eq!(penultimate.ratchet().unwrap().index(), u16::MAX);
    }

    #[test]
    fn numbers_differ_between_positions() {
        let key0 = test_chain();
        let key1 = key0.ratchet().unwrap();
        assert_ne!(key0.temporary_contact_number(), key1.temporary_contact_number());
    }

    #[test]
    fn number_does_not_expose_key_bytes() {
        let key = test_chain();
        let number = key.temporary_contact_number();
        assert_ne!(&key.bytes()[..TCN_LEN], number.as_bytes());
    }

    #[test]
    fn number_try_from_checks_length() {
        assert!(TemporaryContactNumber::try_from(&[0u8; 16][..]).is_ok());
        assert_eq!(
            TemporaryContactNumber::try_from(&[0u8; 15][..]),
            Err(TcnError::InvalidLength { expected: 16, actual: 15 })
        );
    }

    #[test]
    fn debug_hides_key_bytes() {
        let rendered = format!("{:?}", test_chain());
        assert!(rendered.contains("index: 0"));
        assert!(!rendered.contains("bytes"));
    }
}
