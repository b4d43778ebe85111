//! Runtime configuration for sessions and exposure checks
//!
//! Plain structs with defaults matching the deployed protocol. Hosts
//! deserialize them from their own config source or fill them from CLI flags.

use serde::Deserialize;
use tcn_crypto::{MAX_REPORT_PERIODS, PERIOD_MINUTES};

/// Broadcast period length in seconds
pub const PERIOD_SECS: u64 = PERIOD_MINUTES as u64 * 60;

/// Identifiers per `mark_infectious` call
pub const DEFAULT_CHUNK_SIZE: usize = 300_000;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pseudonymous user id carried in report memos and used for
    /// self-report filtering. Empty disables self-report filtering.
    pub user_id: String,

    /// Minimum seconds between ratchet steps.
    pub period_secs: u64,

    /// How many periods a generated report looks back. Clamped to
    /// [`MAX_REPORT_PERIODS`].
    pub lookback_periods: u16,
}

impl SessionConfig {
    /// Default configuration for `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), ..Self::default() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            period_secs: PERIOD_SECS,
            lookback_periods: MAX_REPORT_PERIODS,
        }
    }
}

/// Exposure check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Identifiers handed to the contact store per update call.
    pub chunk_size: usize,

    /// Longest report range accepted from peers, in periods.
    pub lookback_periods: u16,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, lookback_periods: MAX_REPORT_PERIODS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_is_fifteen_minutes() {
        assert_eq!(PERIOD_SECS, 900);
    }

    #[test]
    fn defaults_match_protocol() {
        let check = CheckConfig::default();
        assert_eq!(check.chunk_size, 300_000);
        assert_eq!(check.lookback_periods, 1344);

        let session = SessionConfig::for_user("user-42");
        assert_eq!(session.user_id, "user-42");
        assert_eq!(session.period_secs, 900);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let mut encoded = Vec::new();
        let fields = std::collections::BTreeMap::from([("user_id", "user-7")]);
        ciborium::into_writer(&fields, &mut encoded).unwrap();

        let config: SessionConfig = ciborium::from_reader(encoded.as_slice()).unwrap();
        assert_eq!(config, SessionConfig::for_user("user-7"));
    }
}
