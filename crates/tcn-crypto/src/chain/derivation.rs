//! One-way functions behind the ratchet chain
//!
//! Three distinct derivations, separated by label:
//!
//! - Initial key: HKDF-SHA256 over the authorization secret, salted with the
//!   verification key
//! - Ratchet step: `HMAC-SHA256(tck, "H_TCK" || rvk)`
//! - Contact number: `HMAC-SHA256(tck, "H_TCN" || le_u16(index) || rvk)`
//!   truncated to 16 bytes

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{TCK_LEN, TCN_LEN};
use crate::chain::keys::REPORT_VERIFICATION_KEY_LEN;

type HmacSha256 = Hmac<Sha256>;

/// HKDF info label for the index-0 key
const INITIAL_KEY_LABEL: &[u8] = b"tcn-initial-key-v1";

/// HMAC label for the ratchet step
const RATCHET_LABEL: &[u8] = b"H_TCK";

/// HMAC label for contact number derivation
const NUMBER_LABEL: &[u8] = b"H_TCN";

/// Derive the temporary contact key bytes at index 0.
///
/// Seeded by both the private authorization material and its public
/// verification key, so two keys sharing a secret prefix never share a chain.
pub fn derive_initial_key_bytes(
    authorization_secret: &[u8; 32],
    verification_key: &[u8; REPORT_VERIFICATION_KEY_LEN],
) -> [u8; TCK_LEN] {
    let hkdf = Hkdf::<Sha256>::new(Some(verification_key), authorization_secret);

    let mut out = [0u8; TCK_LEN];
    let Ok(()) = hkdf.expand(INITIAL_KEY_LABEL, &mut out) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    out
}

/// Derive the next key bytes from the current ones.
pub fn ratchet_key_bytes(
    current: &[u8; TCK_LEN],
    verification_key: &[u8; REPORT_VERIFICATION_KEY_LEN],
) -> [u8; TCK_LEN] {
    let Ok(mut mac) = HmacSha256::new_from_slice(current) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(RATCHET_LABEL);
    mac.update(verification_key);
    let result = mac.finalize().into_bytes();

    let mut next = [0u8; TCK_LEN];
    next.copy_from_slice(&result);
    next
}

/// Derive the broadcast number for a chain position.
pub fn derive_number_bytes(
    index: u16,
    key_bytes: &[u8; TCK_LEN],
    verification_key: &[u8; REPORT_VERIFICATION_KEY_LEN],
) -> [u8; TCN_LEN] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key_bytes) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(NUMBER_LABEL);
    mac.update(&index.to_le_bytes());
    mac.update(verification_key);
    let result = mac.finalize().into_bytes();

    let mut number = [0u8; TCN_LEN];
    number.copy_from_slice(&result[..TCN_LEN]);
    number
}
