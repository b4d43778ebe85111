//! Bridge between the radio layer and the protocol core
//!
//! The radio layer only moves raw bytes: it hands over what it heard (plus an
//! optional distance estimate) and asks for what to advertise.

use std::sync::Arc;

use tcn_crypto::TemporaryContactNumber;

use crate::{
    env::Environment,
    error::{ObserveError, SessionError},
    keystore::{SecretKeyStore, TemporaryKeyStore},
    session::Session,
    storage::{ContactStore, RecordId},
};

/// Scan callback target and broadcast number source.
pub struct ContactObserver<E, K, T, S> {
    session: Arc<Session<E, K, T>>,
    store: S,
}

impl<E, K, T, S> ContactObserver<E, K, T, S>
where
    E: Environment,
    K: SecretKeyStore,
    T: TemporaryKeyStore,
    S: ContactStore,
{
    /// Bridge `session` and `store`.
    pub fn new(session: Arc<Session<E, K, T>>, store: S) -> Self {
        Self { session, store }
    }

    /// Record a number heard over the air.
    ///
    /// Payloads that are not exactly one number long are rejected. Negative
    /// or non-finite distance estimates are dropped.
    pub fn on_observed(&self, bytes: &[u8], distance: Option<f32>) -> Result<RecordId, ObserveError> {
        let tcn = TemporaryContactNumber::try_from(bytes)?;
        let distance = distance.filter(|d| d.is_finite() && *d >= 0.0);
        let now = self.session.env().wall_clock_secs();

        let id = self.store.upsert(&tcn, now, now, distance)?;
        tracing::trace!(id, ?distance, "observed contact number");
        Ok(id)
    }

    /// Number to advertise now, rotating first if a period has elapsed.
    pub async fn outbound_number(&self) -> Result<TemporaryContactNumber, SessionError> {
        let now = self.session.env().wall_clock_secs();
        let rotation = self.session.rotate_if_due(now).await?;
        tracing::trace!(?rotation, "outbound number requested");
        self.session.current_number().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use tcn_crypto::TcnError;

    use super::*;
    use crate::{
        config::SessionConfig,
        keystore::{MemorySecretStore, MemoryTemporaryKeyStore},
        storage::MemoryContactStore,
    };

    #[derive(Clone, Default)]
    struct TestEnv {
        clock: Arc<AtomicU64>,
    }

    impl Environment for TestEnv {
        type Instant = std::time::Instant;

        #[allow(clippy::disallowed_methods)]
        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn wall_clock_secs(&self) -> u64 {
            self.clock.load(Ordering::SeqCst)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0x5c);
        }
    }

    fn observer() -> (
        ContactObserver<TestEnv, MemorySecretStore, MemoryTemporaryKeyStore, MemoryContactStore>,
        TestEnv,
        MemoryContactStore,
    ) {
        let env = TestEnv::default();
        let session = Arc::new(Session::new(
            env.clone(),
            MemorySecretStore::new(),
            MemoryTemporaryKeyStore::new(),
            SessionConfig::for_user("me"),
        ));
        let store = MemoryContactStore::new();
        (ContactObserver::new(session, store.clone()), env, store)
    }

    #[test]
    fn sighting_is_timestamped_and_stored() {
        let (observer, env, store) = observer();
        env.clock.store(5_000, Ordering::SeqCst);

        observer.on_observed(&[3; 16], Some(1.25)).unwrap();
        env.clock.store(5_060, Ordering::SeqCst);
        observer.on_observed(&[3; 16], Some(4.0)).unwrap();

        let record = store.lookup(&TemporaryContactNumber::from_bytes([3; 16])).unwrap().unwrap();
        assert_eq!(record.found_secs, 5_000);
        assert_eq!(record.last_seen_secs, 5_060);
        assert_eq!(record.closest_distance, Some(1.25));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let (observer, _, store) = observer();

        let result = observer.on_observed(&[3; 15], None);
        assert_eq!(
            result,
            Err(ObserveError::Malformed(TcnError::InvalidLength { expected: 16, actual: 15 }))
        );
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn bogus_distance_is_dropped() {
        let (observer, _, store) = observer();
        observer.on_observed(&[8; 16], Some(-1.0)).unwrap();
        observer.on_observed(&[9; 16], Some(f32::NAN)).unwrap();

        assert!(store.records().iter().all(|record| record.closest_distance.is_none()));
    }

    #[tokio::test]
    async fn outbound_number_rotates_per_period() {
        let (observer, env, _) = observer();

        let first = observer.outbound_number().await.unwrap();
        env.clock.store(600, Ordering::SeqCst);
        assert_eq!(observer.outbound_number().await.unwrap(), first);

        env.clock.store(900, Ordering::SeqCst);
        assert_ne!(observer.outbound_number().await.unwrap(), first);
    }
}
