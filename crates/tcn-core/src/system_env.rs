//! Device environment backed by the OS clock and RNG.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tcn_crypto::AUTHORIZATION_KEY_LEN;
use zeroize::Zeroizing;

use crate::env::Environment;

/// Real clocks and `getrandom` entropy.
///
/// # Panics
///
/// Panics if the OS RNG fails. A device that cannot mint authorization keys
/// must not fall back to weak entropy: every broadcast number would become
/// predictable.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Fresh authorization key material.
    pub fn random_secret(&self) -> Zeroizing<[u8; AUTHORIZATION_KEY_LEN]> {
        let mut secret = Zeroizing::new([0u8; AUTHORIZATION_KEY_LEN]);
        self.random_bytes(&mut secret[..]);
        secret
    }
}

impl Environment for SystemEnv {
    type Instant = Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }

    /// Clocks set before 1970 read as the epoch.
    #[allow(clippy::disallowed_methods)]
    fn wall_clock_secs(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG available for key minting");
    }
}
