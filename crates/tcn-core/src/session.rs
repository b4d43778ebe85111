//! Per-device protocol session
//!
//! The session is the explicit context object a host creates at startup and
//! passes to the broadcast bridge and the exposure pipeline. It owns the key
//! stores, the user id and the locally flagged "tested positive" status.
//!
//! # Key handling
//!
//! The authorization key is never cached: every operation that needs it reads
//! it from the [`SecretKeyStore`] and drops it when done. If the store cannot
//! be read, a fresh key is minted and persisted, accepting that the broadcast
//! chain becomes unlinkable to the previous one.
//!
//! # Rotation
//!
//! The committed chain position lives in the [`TemporaryKeyStore`]. All
//! mutations hold an async key lock, and a new position is persisted before
//! any caller can observe it, so concurrent readers never see a step that
//! has not committed and no index is broadcast twice.

use std::sync::atomic::{AtomicBool, Ordering};

use tcn_crypto::{
    AUTHORIZATION_KEY_LEN, MAX_REPORT_PERIODS, Memo, ReportAuthorizationKey, SignedReport,
    TcnError, TemporaryContactKey, TemporaryContactNumber, lookback_start,
};
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::{
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    keystore::{AUTHORIZATION_KEY_ACCOUNT, SecretKeyStore, StoredTemporaryKey, TemporaryKeyStore},
};

/// What a rotation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// No position was committed yet; index 0 is now committed.
    Started,
    /// Less than one period elapsed since the last commit.
    NotDue,
    /// The chain advanced one step to `index`.
    Advanced {
        /// Newly committed index
        index: u16,
    },
    /// The chain was exhausted; a new authorization key now broadcasts from
    /// index 0.
    Restarted,
}

/// Device session: keys, identity and local infection status.
pub struct Session<E, K, T> {
    env: E,
    secrets: K,
    temporary_keys: T,
    config: SessionConfig,
    tested_positive: AtomicBool,
    key_lock: Mutex<()>,
}

impl<E, K, T> Session<E, K, T>
where
    E: Environment,
    K: SecretKeyStore,
    T: TemporaryKeyStore,
{
    /// Create a session over the given stores.
    pub fn new(env: E, secrets: K, temporary_keys: T, config: SessionConfig) -> Self {
        Self {
            env,
            secrets,
            temporary_keys,
            config,
            tested_positive: AtomicBool::new(false),
            key_lock: Mutex::new(()),
        }
    }

    /// Pseudonymous user id.
    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Environment the session reads time and entropy from.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Flag or unflag the local user as tested positive.
    pub fn set_tested_positive(&self, positive: bool) {
        self.tested_positive.store(positive, Ordering::SeqCst);
    }

    /// True if the local user is flagged as tested positive.
    pub fn is_tested_positive(&self) -> bool {
        self.tested_positive.load(Ordering::SeqCst)
    }

    /// Authorization key from the secret store, minting one if needed.
    ///
    /// Never fails: an unreadable store yields a fresh key.
    pub async fn authorization_key(&self) -> ReportAuthorizationKey {
        let _guard = self.key_lock.lock().await;
        self.load_or_mint_authorization_key()
    }

    /// The committed temporary contact key.
    ///
    /// Falls back to index 0 of the current authorization key when nothing
    /// is committed.
    pub async fn current_key(&self) -> Result<TemporaryContactKey, SessionError> {
        let _guard = self.key_lock.lock().await;
        let authorization_key = self.load_or_mint_authorization_key();
        self.committed_or_initial(&authorization_key)
    }

    /// The number to broadcast right now.
    pub async fn current_number(&self) -> Result<TemporaryContactNumber, SessionError> {
        Ok(self.current_key().await?.temporary_contact_number())
    }

    /// Advance the chain if a full period elapsed since the last commit.
    ///
    /// Takes at most one step per call, however long the device was idle:
    /// positions are never broadcast retroactively.
    pub async fn rotate_if_due(&self, now_secs: u64) -> Result<Rotation, SessionError> {
        let _guard = self.key_lock.lock().await;
        let authorization_key = self.load_or_mint_authorization_key();

        let Some(stored) = self.committed(&authorization_key)? else {
            let initial = authorization_key.initial_temporary_contact_key();
            self.temporary_keys.store(StoredTemporaryKey::new(&initial, now_secs))?;
            tracing::info!(index = 0, "committed initial temporary contact key");
            return Ok(Rotation::Started);
        };

        if now_secs.saturating_sub(stored.rotated_at_secs) < self.config.period_secs {
            return Ok(Rotation::NotDue);
        }

        self.advance(&stored.to_key(), now_secs)
    }

    /// Return the current number, then advance the chain one step.
    ///
    /// For broadcast layers that run their own period timer and ask for a
    /// number each time it fires.
    pub async fn next_broadcast_number(&self) -> Result<TemporaryContactNumber, SessionError> {
        let _guard = self.key_lock.lock().await;
        let authorization_key = self.load_or_mint_authorization_key();

        let current = self.committed_or_initial(&authorization_key)?;
        let number = current.temporary_contact_number();
        self.advance(&current, self.env.wall_clock_secs())?;

        Ok(number)
    }

    /// Sign a report disclosing the lookback window ending at the current
    /// index.
    ///
    /// The memo carries the user id so peers can filter out their own
    /// reports.
    pub async fn generate_report(&self) -> Result<SignedReport, SessionError> {
        let _guard = self.key_lock.lock().await;
        let authorization_key = self.load_or_mint_authorization_key();

        let end_index = self.committed_or_initial(&authorization_key)?.index();
        let lookback = self.config.lookback_periods.min(MAX_REPORT_PERIODS);
        let start_index = lookback_start(end_index, lookback);
        let memo = Memo::covid_watch(&self.config.user_id)?;

        let report = authorization_key.create_signed_report(memo, start_index, end_index)?;
        tracing::info!(start_index, end_index, "generated signed report");

        Ok(report)
    }

    /// Forget all key material (logout).
    ///
    /// Both stores are attempted even if the first fails; the first error is
    /// returned.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let _guard = self.key_lock.lock().await;

        let secret = self.secrets.delete_key(AUTHORIZATION_KEY_ACCOUNT);
        let temporary = self.temporary_keys.clear();
        self.tested_positive.store(false, Ordering::SeqCst);
        tracing::info!("session reset");

        secret?;
        temporary?;
        Ok(())
    }

    /// Read the authorization key, or mint and persist a new one.
    ///
    /// Caller must hold the key lock.
    fn load_or_mint_authorization_key(&self) -> ReportAuthorizationKey {
        match self.secrets.read_key(AUTHORIZATION_KEY_ACCOUNT) {
            Ok(Some(secret)) => return ReportAuthorizationKey::from_bytes(&secret),
            Ok(None) => tracing::info!("no authorization key stored, minting a new one"),
            Err(e) => tracing::warn!("secret store unreadable, minting a fresh key: {}", e),
        }
        self.mint_authorization_key()
    }

    fn mint_authorization_key(&self) -> ReportAuthorizationKey {
        let mut secret = Zeroizing::new([0u8; AUTHORIZATION_KEY_LEN]);
        self.env.random_bytes(&mut secret[..]);
        let key = ReportAuthorizationKey::from_bytes(&secret);

        if let Err(e) = self.secrets.store_key(&secret, AUTHORIZATION_KEY_ACCOUNT) {
            tracing::warn!("could not persist authorization key: {}", e);
        }

        key
    }

    /// Committed position, if it belongs to `authorization_key`.
    fn committed(
        &self,
        authorization_key: &ReportAuthorizationKey,
    ) -> Result<Option<StoredTemporaryKey>, SessionError> {
        let Some(stored) = self.temporary_keys.load()? else {
            return Ok(None);
        };

        if stored.verification_key != authorization_key.verification_key() {
            tracing::warn!(
                index = stored.index,
                "committed key belongs to a different authorization key, restarting chain"
            );
            return Ok(None);
        }

        Ok(Some(stored))
    }

    fn committed_or_initial(
        &self,
        authorization_key: &ReportAuthorizationKey,
    ) -> Result<TemporaryContactKey, SessionError> {
        Ok(self
            .committed(authorization_key)?
            .map_or_else(|| authorization_key.initial_temporary_contact_key(), |stored| stored.to_key()))
    }

    /// Ratchet `current` and commit the result, restarting the chain under a
    /// new authorization key when it is exhausted.
    fn advance(
        &self,
        current: &TemporaryContactKey,
        now_secs: u64,
    ) -> Result<Rotation, SessionError> {
        match current.ratchet() {
            Ok(next) => {
                self.temporary_keys.store(StoredTemporaryKey::new(&next, now_secs))?;
                tracing::debug!(index = next.index(), "ratcheted temporary contact key");
                Ok(Rotation::Advanced { index: next.index() })
            },
            Err(TcnError::ChainExhausted { index }) => {
                tracing::warn!(index, "ratchet chain exhausted, minting new authorization key");
                let authorization_key = self.mint_authorization_key();
                let initial = authorization_key.initial_temporary_contact_key();
                self.temporary_keys.store(StoredTemporaryKey::new(&initial, now_secs))?;
                Ok(Rotation::Restarted)
            },
            Err(e) => Err(e.into()),
        }
    }
}
