//! Fuzz target for SignedReport::from_bytes
//!
//! Downloaded reports are untrusted. Decoding arbitrary bytes must never
//! panic, and anything that does decode must re-encode to the same bytes
//! and expand to exactly `period_count` numbers.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tcn_crypto::SignedReport;

fuzz_target!(|data: &[u8]| {
    let Ok(report) = SignedReport::from_bytes(data) else {
        return;
    };

    assert_eq!(report.to_bytes(), data, "decode is not canonical");

    // Verification must return a verdict, never panic
    let _ = report.verify();

    let inner = report.report();
    assert!(inner.start_index() <= inner.end_index());
    // Bound work on huge foreign ranges
    if inner.period_count() <= 2048 {
        assert_eq!(inner.temporary_contact_numbers().count(), inner.period_count());
    }
});
