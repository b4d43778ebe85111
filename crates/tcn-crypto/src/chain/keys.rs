//! Report authorization key pair

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey};
use zeroize::Zeroizing;

use super::{TemporaryContactKey, derivation::derive_initial_key_bytes};
use crate::error::TcnError;

/// Length of the private authorization key
pub const AUTHORIZATION_KEY_LEN: usize = 32;

/// Length of the public report verification key
pub const REPORT_VERIFICATION_KEY_LEN: usize = 32;

/// Public half of the authorization key, embedded in every contact key and
/// report.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportVerificationKey([u8; REPORT_VERIFICATION_KEY_LEN]);

impl ReportVerificationKey {
    /// Wrap raw verification key bytes.
    ///
    /// No curve check happens here; it is deferred to signature verification
    /// so decoding a report never fails on key content alone.
    pub fn from_bytes(bytes: [u8; REPORT_VERIFICATION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; REPORT_VERIFICATION_KEY_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for ReportVerificationKey {
    type Error = TcnError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; REPORT_VERIFICATION_KEY_LEN] =
            bytes.try_into().map_err(|_| TcnError::InvalidLength {
                expected: REPORT_VERIFICATION_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ReportVerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReportVerificationKey(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Long-lived Ed25519 key pair rooting a device's ratchet chain.
///
/// Never transmitted. The signing key zeroizes itself on drop, and `Debug`
/// never prints secret material.
pub struct ReportAuthorizationKey {
    signing_key: SigningKey,
}

impl ReportAuthorizationKey {
    /// Restore a key from its 32-byte secret.
    ///
    /// Callers mint new keys by passing 32 bytes of OS entropy.
    pub fn from_bytes(secret: &[u8; AUTHORIZATION_KEY_LEN]) -> Self {
        Self { signing_key: SigningKey::from_bytes(secret) }
    }

    /// Secret bytes for handing to a secure key store.
    pub fn to_bytes(&self) -> Zeroizing<[u8; AUTHORIZATION_KEY_LEN]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Public verification key.
    pub fn verification_key(&self) -> ReportVerificationKey {
        ReportVerificationKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Temporary contact key at index 0.
    pub fn initial_temporary_contact_key(&self) -> TemporaryContactKey {
        let rvk = self.verification_key();
        let secret = self.to_bytes();
        let bytes = derive_initial_key_bytes(&secret, rvk.as_bytes());
        TemporaryContactKey::new(0, rvk, bytes)
    }

    /// Temporary contact key at `index`, by ratcheting forward from index 0.
    ///
    /// Every index up to `u16::MAX` is reachable, so this cannot fail.
    pub fn temporary_contact_key_at(&self, index: u16) -> TemporaryContactKey {
        let mut key = self.initial_temporary_contact_key();
        for _ in 0..index {
            let Ok(next) = key.ratchet() else {
                unreachable!("index {} is below u16::MAX", key.index());
            };
            key = next;
        }
        key
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for ReportAuthorizationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportAuthorizationKey")
            .field("verification_key", &self.verification_key())
            .finish_non_exhaustive()
    }
}
