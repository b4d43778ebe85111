//! Contact store abstraction
//!
//! The store holds one record per distinct number heard over the air. The
//! protocol core never creates records on its own behalf except through the
//! scan bridge, and the only state it changes afterwards is the
//! `was_potentially_infectious` flag, which moves `false -> true` and never
//! back, and the `exposure_reported` marker, which follows it once the
//! exposure has been handed to the transport.
//!
//! The trait is synchronous, like the on-device databases it fronts. Batch
//! operations take caller-sized slices so the exposure pipeline controls
//! memory use.

mod chaotic;
mod error;
mod memory;

pub use chaotic::ChaoticContactStore;
pub use error::StorageError;
pub use memory::MemoryContactStore;
use tcn_crypto::TemporaryContactNumber;

/// Store-assigned record identifier
pub type RecordId = u64;

/// A number observed over the air, plus when and how close.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// The observed broadcast number.
    pub tcn: TemporaryContactNumber,
    /// Unix seconds of the first sighting.
    pub found_secs: u64,
    /// Unix seconds of the latest sighting.
    pub last_seen_secs: u64,
    /// Closest estimated distance in meters, if the radio reported one.
    pub closest_distance: Option<f32>,
    /// Set once a verified report disclosed this number.
    pub was_potentially_infectious: bool,
    /// Set once the exposure this record belongs to was reported upstream.
    pub exposure_reported: bool,
}

/// Storage abstraction for observed contact numbers
///
/// Must be Clone (shared between the scan bridge and the exposure pipeline),
/// Send + Sync, and synchronous. Implementations typically share internal
/// state via Arc, so clones access the same underlying records.
pub trait ContactStore: Clone + Send + Sync + 'static {
    /// Record for `tcn`, if it was ever observed.
    fn lookup(&self, tcn: &TemporaryContactNumber) -> Result<Option<ContactRecord>, StorageError>;

    /// Record a sighting.
    ///
    /// Creates the record on first sighting. Later sightings keep the
    /// earliest `found_secs`, the latest `last_seen_secs` and the closest
    /// distance; the infectious flag is untouched.
    fn upsert(
        &self,
        tcn: &TemporaryContactNumber,
        found_secs: u64,
        last_seen_secs: u64,
        distance: Option<f32>,
    ) -> Result<RecordId, StorageError>;

    /// Flag every record whose number is in `tcns` and is not yet flagged.
    ///
    /// Returns only the ids that changed, so running the same batch twice
    /// returns nothing the second time.
    ///
    /// # Invariants
    ///
    /// - Post: every stored record matching `tcns` is flagged
    /// - The flag is never cleared
    fn mark_infectious(&self, tcns: &[TemporaryContactNumber])
    -> Result<Vec<RecordId>, StorageError>;

    /// Flagged records among `tcns` whose exposure was not yet reported.
    ///
    /// Includes records flagged by an earlier run that stopped before
    /// reporting, so a retry picks them up again.
    fn pending_exposures(
        &self,
        tcns: &[TemporaryContactNumber],
    ) -> Result<Vec<ContactRecord>, StorageError>;

    /// Mark records as reported upstream. Unknown ids are skipped.
    ///
    /// Called only after the exposure upload succeeded.
    fn mark_exposure_reported(&self, ids: &[RecordId]) -> Result<(), StorageError>;

    /// Load records by id. Unknown ids are skipped.
    fn load_by_ids(&self, ids: &[RecordId]) -> Result<Vec<ContactRecord>, StorageError>;

    /// Number of stored records.
    fn record_count(&self) -> Result<usize, StorageError>;
}
