//! Chaos tests for the exposure pipeline
//!
//! With a contact store that randomly fails, every run must either succeed
//! or end in a single storage error, and repeated runs must converge on the
//! same flagged set a fault-free run produces, with every flagged record
//! reported upstream at least once.
//!
//! Each run restarts from the first chunk, so a run only completes when all
//! of its store calls succeed. Failure rates and chunk sizes are kept where
//! a clean run is likely within the attempt budget.

use std::sync::Arc;

use proptest::prelude::*;
use tcn_core::{
    CancellationFlag, ChaoticContactStore, CheckConfig, CheckError, ContactStore, Environment,
    ExposureCheck, MemoryContactStore, MemorySecretStore, MemoryTemporaryKeyStore,
    MemoryTransport, Session, SessionConfig,
};
use tcn_crypto::{Memo, ReportAuthorizationKey};

#[derive(Clone)]
struct TestEnv;

impl Environment for TestEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn wall_clock_secs(&self) -> u64 {
        1_700_000_000
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x77);
    }
}

#[test]
fn prop_pipeline_chaos_converges() {
    proptest!(ProptestConfig::with_cases(32), |(
        failure_rate in 0.0..0.1,
        seed in any::<u64>(),
        heard in prop::collection::btree_set(0u16..40, 1..10),
        chunk_size in 8usize..32,
    )| {
        let reporter = ReportAuthorizationKey::from_bytes(&[0x31; 32]);
        let inner = MemoryContactStore::new();
        let mut expected = Vec::new();
        for &index in &heard {
            let tcn = reporter.temporary_contact_key_at(index).temporary_contact_number();
            let id = inner.upsert(&tcn, 0, 0, None).unwrap();
            if index <= 30 {
                expected.push(id);
            }
        }

        let board = Arc::new(MemoryTransport::new());
        let exposures = Arc::clone(&board);
        board.publish(
            reporter.create_signed_report(Memo::covid_watch("peer").unwrap(), 0, 30).unwrap().to_bytes(),
        );

        let session = Arc::new(Session::new(
            TestEnv,
            MemorySecretStore::new(),
            MemoryTemporaryKeyStore::new(),
            SessionConfig::for_user("local"),
        ));
        let store = ChaoticContactStore::with_seed(inner.clone(), failure_rate, seed);
        let check = ExposureCheck::new(
            session,
            store,
            board,
            CheckConfig { chunk_size, ..CheckConfig::default() },
        );

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let mut succeeded = false;
        for _ in 0..64 {
            match rt.block_on(check.run(&CancellationFlag::new())) {
                Ok(_) => {
                    succeeded = true;
                    break;
                },
                Err(CheckError::Storage(_)) => {},
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }

        // Flags only ever move forward and end at the fault-free set
        prop_assert!(succeeded);
        prop_assert_eq!(inner.infectious_ids(), expected.clone());

        // Every flagged record was reported at least once
        let reported: Vec<_> =
            inner.records().into_iter().filter(|record| record.exposure_reported).map(|record| record.id).collect();
        prop_assert_eq!(reported, expected.clone());
        let batches = exposures.exposure_batches().unwrap();
        prop_assert_eq!(batches.is_empty(), expected.is_empty());
    });
}

#[test]
fn failed_run_keeps_committed_flags() {
    let reporter = ReportAuthorizationKey::from_bytes(&[0x32; 32]);
    let inner = MemoryContactStore::new();
    let tcn = reporter.temporary_contact_key_at(0).temporary_contact_number();
    let id = inner.upsert(&tcn, 0, 0, None).unwrap();

    let board = Arc::new(MemoryTransport::new());
    board.publish(reporter.create_signed_report(Memo::covid_watch("peer").unwrap(), 0, 5).unwrap().to_bytes());

    let session = Arc::new(Session::new(
        TestEnv,
        MemorySecretStore::new(),
        MemoryTemporaryKeyStore::new(),
        SessionConfig::for_user("local"),
    ));

    let check = ExposureCheck::new(Arc::clone(&session), inner.clone(), Arc::clone(&board), CheckConfig::default());
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let outcome = rt.block_on(check.run(&CancellationFlag::new())).unwrap();
    assert_eq!(outcome.newly_flagged, vec![id]);

    // Every store call now fails; the earlier flag must survive
    let broken = ExposureCheck::new(
        session,
        ChaoticContactStore::new(inner.clone(), 1.0),
        board,
        CheckConfig::default(),
    );
    let result = rt.block_on(broken.run(&CancellationFlag::new()));
    assert!(matches!(result, Err(CheckError::Storage(_))));
    assert_eq!(inner.infectious_ids(), vec![id]);
}
