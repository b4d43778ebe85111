//! Chaotic contact store wrapper for fault injection testing
//!
//! Randomly fails operations so tests can check that the exposure pipeline
//! surfaces storage failures as a single terminal error and that committed
//! updates survive a failed run.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use tcn_crypto::TemporaryContactNumber;

use super::{ContactRecord, ContactStore, RecordId, StorageError};

/// Contact store wrapper that randomly injects failures
///
/// Delegates to an underlying store but fails operations with probability
/// `failure_rate`. A failed operation never reaches the inner store, so
/// failures are atomic.
#[derive(Clone)]
pub struct ChaoticContactStore<S: ContactStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
}

/// Linear congruential generator, so chaos runs replay from a seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: ContactStore> ChaoticContactStore<S> {
    /// Wrap `inner` with a fixed seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of store operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Count the operation and decide whether it fails.
    fn inject(&self) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        {
            *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;
        }

        #[allow(clippy::expect_used)]
        let fail = self.rng.lock().expect("ChaoticRng mutex poisoned").next() < self.failure_rate;
        if fail {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: ContactStore> ContactStore for ChaoticContactStore<S> {
    fn lookup(&self, tcn: &TemporaryContactNumber) -> Result<Option<ContactRecord>, StorageError> {
        self.inject()?;
        self.inner.lookup(tcn)
    }

    fn upsert(
        &self,
        tcn: &TemporaryContactNumber,
        found_secs: u64,
        last_seen_secs: u64,
        distance: Option<f32>,
    ) -> Result<RecordId, StorageError> {
        self.inject()?;
        self.inner.upsert(tcn, found_secs, last_seen_secs, distance)
    }

    fn mark_infectious(
        &self,
        tcns: &[TemporaryContactNumber],
    ) -> Result<Vec<RecordId>, StorageError> {
        self.inject()?;
        self.inner.mark_infectious(tcns)
    }

    fn pending_exposures(
        &self,
        tcns: &[TemporaryContactNumber],
    ) -> Result<Vec<ContactRecord>, StorageError> {
        self.inject()?;
        self.inner.pending_exposures(tcns)
    }

    fn mark_exposure_reported(&self, ids: &[RecordId]) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.mark_exposure_reported(ids)
    }

    fn load_by_ids(&self, ids: &[RecordId]) -> Result<Vec<ContactRecord>, StorageError> {
        self.inject()?;
        self.inner.load_by_ids(ids)
    }

    fn record_count(&self) -> Result<usize, StorageError> {
        self.inject()?;
        self.inner.record_count()
    }
}
