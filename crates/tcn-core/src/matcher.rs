//! Exposure matching
//!
//! Reconciles the numbers a report discloses with the numbers this device
//! heard. Matching is byte-exact equality on the full 16-byte number; there is
//! no prefix or fuzzy matching.
//!
//! Before a report is matched it must be admitted: the signature must verify,
//! its range must fit the lookback window, and it must not be the device's
//! own report.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tcn_crypto::{MemoType, Report, SignedReport, TemporaryContactNumber};

use crate::storage::{ContactRecord, ContactStore, StorageError};

/// Exposure evidence: a heard number disclosed by a verified report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Reporter's pseudonymous id (memo payload, lossy UTF-8).
    pub reporter: String,
    /// Memo format of the report.
    #[serde(with = "memo_type_tag")]
    pub memo_type: MemoType,
    /// Matched number of the closest sighting.
    #[serde(with = "tcn_bytes")]
    pub tcn: TemporaryContactNumber,
    /// Closest estimated distance in meters across the report's matches.
    pub distance_meters: Option<f32>,
    /// Earliest first sighting across the report's matches.
    pub found_secs: u64,
    /// Latest sighting across the report's matches.
    pub last_seen_secs: u64,
}

/// Whether a report may be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Verified, within the window, and from someone else.
    Accepted,
    /// Signature does not verify against the embedded key.
    InvalidSignature,
    /// Range spans more periods than the lookback window.
    OutsideWindow,
    /// Memo carries this device's own user id.
    OwnReport,
}

/// Admission policy plus the cross-report matching pass.
#[derive(Debug, Clone)]
pub struct ExposureMatcher {
    user_id: String,
    lookback_periods: u16,
}

impl ExposureMatcher {
    /// Matcher for a device identified by `user_id`.
    ///
    /// An empty `user_id` disables self-report filtering.
    pub fn new(user_id: impl Into<String>, lookback_periods: u16) -> Self {
        Self { user_id: user_id.into(), lookback_periods }
    }

    /// Decide whether `report` may be matched.
    ///
    /// Verification is mandatory. A report that fails it is logged and
    /// excluded, never matched.
    pub fn admit(&self, report: &SignedReport) -> Admission {
        let inner = report.report();

        match report.verify() {
            Ok(true) => {},
            Ok(false) => {
                tracing::warn!(
                    start = inner.start_index(),
                    end = inner.end_index(),
                    "rejecting report with invalid signature"
                );
                return Admission::InvalidSignature;
            },
            Err(e) => {
                tracing::warn!("rejecting report: {}", e);
                return Admission::InvalidSignature;
            },
        }

        if inner.end_index() - inner.start_index() > self.lookback_periods {
            tracing::warn!(
                periods = inner.period_count(),
                max = self.lookback_periods,
                "rejecting report outside lookback window"
            );
            return Admission::OutsideWindow;
        }

        if self.is_own_report(inner) {
            tracing::debug!("skipping own report");
            return Admission::OwnReport;
        }

        Admission::Accepted
    }

    /// Read-only pass: contacts for every admitted report that discloses a
    /// stored number, one per report, in report order.
    ///
    /// Looks numbers up one at a time, so memory stays bounded by the
    /// matches rather than by the store or the window.
    pub fn check_exposure<S: ContactStore>(
        &self,
        reports: &[SignedReport],
        store: &S,
    ) -> Result<Vec<Contact>, StorageError> {
        let mut contacts = Vec::new();

        for report in reports {
            if self.admit(report) != Admission::Accepted {
                continue;
            }

            let mut matches = Vec::new();
            for tcn in report.report().temporary_contact_numbers() {
                if let Some(record) = store.lookup(&tcn)? {
                    matches.push(record);
                }
            }

            contacts.extend(contact_for_report(report.report(), &matches));
        }

        Ok(contacts)
    }

    fn is_own_report(&self, report: &Report) -> bool {
        !self.user_id.is_empty() && report.memo().data() == self.user_id.as_bytes()
    }
}

/// Observations whose number appears in `numbers`, in observation order.
///
/// `numbers` is consumed once into a set bounded by the report range.
pub fn find_matches<'a, I>(observations: &'a [ContactRecord], numbers: I) -> Vec<&'a ContactRecord>
where
    I: IntoIterator<Item = TemporaryContactNumber>,
{
    let disclosed: HashSet<TemporaryContactNumber> = numbers.into_iter().collect();
    observations.iter().filter(|record| disclosed.contains(&record.tcn)).collect()
}

/// Summarize one report's matched records as a single contact.
///
/// The closest sighting supplies the number and distance (ties go to the
/// earliest); the time window spans every match. `None` if nothing matched.
pub fn contact_for_report(report: &Report, matches: &[ContactRecord]) -> Option<Contact> {
    let closest = matches.iter().min_by(|a, b| {
        let da = a.closest_distance.unwrap_or(f32::INFINITY);
        let db = b.closest_distance.unwrap_or(f32::INFINITY);
        da.total_cmp(&db).then(a.found_secs.cmp(&b.found_secs))
    })?;

    let found_secs = matches.iter().map(|record| record.found_secs).min().unwrap_or(closest.found_secs);
    let last_seen_secs =
        matches.iter().map(|record| record.last_seen_secs).max().unwrap_or(closest.last_seen_secs);

    Some(Contact {
        reporter: report.memo().data_lossy(),
        memo_type: report.memo().memo_type(),
        tcn: closest.tcn,
        distance_meters: closest.closest_distance,
        found_secs,
        last_seen_secs,
    })
}

mod memo_type_tag {
    use serde::{Deserialize, Deserializer, Serializer};
    use tcn_crypto::MemoType;

    pub fn serialize<S: Serializer>(memo_type: &MemoType, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*memo_type))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MemoType, D::Error> {
        u8::deserialize(deserializer).map(MemoType::from)
    }
}

mod tcn_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use tcn_crypto::{TCN_LEN, TemporaryContactNumber};

    pub fn serialize<S: Serializer>(
        tcn: &TemporaryContactNumber,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        tcn.as_bytes().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<TemporaryContactNumber, D::Error> {
        <[u8; TCN_LEN]>::deserialize(deserializer).map(TemporaryContactNumber::from_bytes)
    }
}
