//! Environment abstraction for deterministic testing.
//!
//! Decouples the session and the exposure pipeline from system resources
//! (clocks, entropy). Production code uses [`SystemEnv`](crate::SystemEnv);
//! tests supply a settable clock and seeded bytes so key minting and rotation
//! are reproducible.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production,
///   since it seeds report authorization keys
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic). Used for measuring pipeline runs.
    fn now(&self) -> Self::Instant;

    /// Seconds since the Unix epoch.
    ///
    /// Timestamps contact sightings and key rotations. May jump when the
    /// device clock is adjusted; callers must tolerate that.
    fn wall_clock_secs(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}
