//! Fuzz target for signed report tampering
//!
//! # Strategy
//!
//! - Sign a report over an arbitrary key, range and memo
//! - Flip one bit anywhere in the encoding
//!
//! # Invariants
//!
//! - An untouched report MUST verify
//! - A tampered report MUST fail to decode or fail to verify
//! - Expansion MUST equal walking the signer's own chain

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tcn_crypto::{Memo, MemoType, ReportAuthorizationKey, SignedReport, TcnError};

#[derive(Debug, Arbitrary)]
struct Input {
    secret: [u8; 32],
    start: u8,
    span: u8,
    memo_type: u8,
    memo: Vec<u8>,
    flip_at: u16,
    flip_bit: u8,
}

fuzz_target!(|input: Input| {
    let key = ReportAuthorizationKey::from_bytes(&input.secret);
    let memo = match Memo::new(MemoType::from(input.memo_type), input.memo) {
        Ok(memo) => memo,
        Err(TcnError::MemoTooLong { .. }) => return,
        Err(e) => panic!("unexpected memo error: {e}"),
    };

    let start = u16::from(input.start);
    let end = start + u16::from(input.span);
    let Ok(signed) = key.create_signed_report(memo, start, end) else {
        panic!("range {start}..={end} should be signable");
    };

    assert_eq!(signed.verify(), Ok(true));

    let mut tck = key.temporary_contact_key_at(start);
    for (offset, tcn) in signed.report().temporary_contact_numbers().enumerate() {
        if offset > 0 {
            let Ok(next) = tck.ratchet() else { panic!("ratchet failed below u16::MAX") };
            tck = next;
        }
        assert_eq!(tcn, tck.temporary_contact_number());
    }

    let mut bytes = signed.to_bytes();
    let at = usize::from(input.flip_at) % bytes.len();
    bytes[at] ^= 1 << (input.flip_bit % 8);

    if let Ok(tampered) = SignedReport::from_bytes(&bytes) {
        assert_ne!(tampered.verify(), Ok(true), "tampered report verified");
    }
});
