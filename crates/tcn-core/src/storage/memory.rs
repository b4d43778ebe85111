#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use tcn_crypto::TemporaryContactNumber;

use super::{ContactRecord, ContactStore, RecordId, StorageError};

/// In-memory contact store for tests, simulation and the CLI
///
/// Records live in a `BTreeMap` keyed by id (so snapshots come out in
/// insertion order) with a `HashMap` index from number to id. All state is
/// wrapped in Arc<Mutex<>> so clones share records. Uses `lock().expect()`,
/// which panics if the mutex is poisoned.
#[derive(Clone, Default)]
pub struct MemoryContactStore {
    inner: Arc<Mutex<MemoryContactStoreInner>>,
}

#[derive(Default)]
struct MemoryContactStoreInner {
    records: BTreeMap<RecordId, ContactRecord>,
    by_tcn: HashMap<TemporaryContactNumber, RecordId>,
    next_id: RecordId,
}

impl MemoryContactStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn records(&self) -> Vec<ContactRecord> {
        self.inner.lock().expect("Mutex poisoned").records.values().cloned().collect()
    }

    /// Ids of every flagged record.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn infectious_ids(&self) -> Vec<RecordId> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        inner
            .records
            .values()
            .filter(|record| record.was_potentially_infectious)
            .map(|record| record.id)
            .collect()
    }
}

fn closer(current: Option<f32>, candidate: Option<f32>) -> Option<f32> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl ContactStore for MemoryContactStore {
    #[allow(clippy::expect_used)]
    fn lookup(&self, tcn: &TemporaryContactNumber) -> Result<Option<ContactRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.by_tcn.get(tcn).and_then(|id| inner.records.get(id)).cloned())
    }

    #[allow(clippy::expect_used)]
    fn upsert(
        &self,
        tcn: &TemporaryContactNumber,
        found_secs: u64,
        last_seen_secs: u64,
        distance: Option<f32>,
    ) -> Result<RecordId, StorageError> {
        let mut guard = self.inner.lock().expect("Mutex poisoned");
        let inner = &mut *guard;

        if let Some(&id) = inner.by_tcn.get(tcn) {
            if let Some(record) = inner.records.get_mut(&id) {
                record.found_secs = record.found_secs.min(found_secs);
                record.last_seen_secs = record.last_seen_secs.max(last_seen_secs);
                record.closest_distance = closer(record.closest_distance, distance);
            }
            return Ok(id);
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_tcn.insert(*tcn, id);
        inner.records.insert(id, ContactRecord {
            id,
            tcn: *tcn,
            found_secs,
            last_seen_secs: last_seen_secs.max(found_secs),
            closest_distance: distance,
            was_potentially_infectious: false,
            exposure_reported: false,
        });

        Ok(id)
    }

    #[allow(clippy::expect_used)]
    fn mark_infectious(
        &self,
        tcns: &[TemporaryContactNumber],
    ) -> Result<Vec<RecordId>, StorageError> {
        let mut guard = self.inner.lock().expect("Mutex poisoned");
        let inner = &mut *guard;

        let mut updated = Vec::new();
        for tcn in tcns {
            let Some(id) = inner.by_tcn.get(tcn) else {
                continue;
            };
            if let Some(record) = inner.records.get_mut(id) {
                if !record.was_potentially_infectious {
                    record.was_potentially_infectious = true;
                    updated.push(record.id);
                }
            }
        }

        Ok(updated)
    }

    #[allow(clippy::expect_used)]
    fn pending_exposures(
        &self,
        tcns: &[TemporaryContactNumber],
    ) -> Result<Vec<ContactRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut seen = HashSet::new();

        Ok(tcns
            .iter()
            .filter_map(|tcn| inner.by_tcn.get(tcn))
            .filter(|&&id| seen.insert(id))
            .filter_map(|id| inner.records.get(id))
            .filter(|record| record.was_potentially_infectious && !record.exposure_reported)
            .cloned()
            .collect())
    }

    #[allow(clippy::expect_used)]
    fn mark_exposure_reported(&self, ids: &[RecordId]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        for id in ids {
            if let Some(record) = inner.records.get_mut(id) {
                record.exposure_reported = true;
            }
        }
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn load_by_ids(&self, ids: &[RecordId]) -> Result<Vec<ContactRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(ids.iter().filter_map(|id| inner.records.get(id).cloned()).collect())
    }

    #[allow(clippy::expect_used)]
    fn record_count(&self) -> Result<usize, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcn(byte: u8) -> TemporaryContactNumber {
        TemporaryContactNumber::from_bytes([byte; 16])
    }

    #[test]
    fn first_sighting_creates_record() {
        let store = MemoryContactStore::new();
        let id = store.upsert(&tcn(1), 100, 100, Some(2.5)).unwrap();

        let record = store.lookup(&tcn(1)).unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.found_secs, 100);
        assert_eq!(record.closest_distance, Some(2.5));
        assert!(!record.was_potentially_infectious);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn later_sightings_widen_window_and_keep_closest_distance() {
        let store = MemoryContactStore::new();
        let first = store.upsert(&tcn(1), 100, 100, Some(2.5)).unwrap();
        let second = store.upsert(&tcn(1), 160, 160, Some(4.0)).unwrap();
        store.upsert(&tcn(1), 220, 220, None).unwrap();

        assert_eq!(first, second);
        let record = store.lookup(&tcn(1)).unwrap().unwrap();
        assert_eq!(record.found_secs, 100);
        assert_eq!(record.last_seen_secs, 220);
        assert_eq!(record.closest_distance, Some(2.5));
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn distance_fills_in_when_first_sighting_had_none() {
        let store = MemoryContactStore::new();
        store.upsert(&tcn(1), 100, 100, None).unwrap();
        store.upsert(&tcn(1), 110, 110, Some(7.0)).unwrap();

        assert_eq!(store.lookup(&tcn(1)).unwrap().unwrap().closest_distance, Some(7.0));
    }

    #[test]
    fn mark_infectious_reports_only_changes() {
        let store = MemoryContactStore::new();
        let a = store.upsert(&tcn(1), 1, 1, None).unwrap();
        let b = store.upsert(&tcn(2), 1, 1, None).unwrap();
        store.upsert(&tcn(3), 1, 1, None).unwrap();

        let updated = store.mark_infectious(&[tcn(1), tcn(2), tcn(9), tcn(1)]).unwrap();
        assert_eq!(updated, vec![a, b]);

        let again = store.mark_infectious(&[tcn(1), tcn(2)]).unwrap();
        assert!(again.is_empty());
        assert_eq!(store.infectious_ids(), vec![a, b]);
    }

    #[test]
    fn upsert_never_clears_flag() {
        let store = MemoryContactStore::new();
        store.upsert(&tcn(1), 1, 1, None).unwrap();
        store.mark_infectious(&[tcn(1)]).unwrap();
        store.upsert(&tcn(1), 5, 5, Some(1.0)).unwrap();

        assert!(store.lookup(&tcn(1)).unwrap().unwrap().was_potentially_infectious);
    }

    #[test]
    fn pending_exposures_are_flagged_and_unreported() {
        let store = MemoryContactStore::new();
        let a = store.upsert(&tcn(1), 1, 1, None).unwrap();
        let b = store.upsert(&tcn(2), 1, 1, None).unwrap();
        store.upsert(&tcn(3), 1, 1, None).unwrap();
        store.mark_infectious(&[tcn(1), tcn(2)]).unwrap();

        let pending = store.pending_exposures(&[tcn(1), tcn(2), tcn(3), tcn(1)]).unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, b]);

        store.mark_exposure_reported(&[a, 42]).unwrap();
        let pending = store.pending_exposures(&[tcn(1), tcn(2), tcn(3)]).unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b]);
        assert!(store.lookup(&tcn(1)).unwrap().unwrap().exposure_reported);
    }

    #[test]
    fn load_by_ids_skips_unknown() {
        let store = MemoryContactStore::new();
        let a = store.upsert(&tcn(1), 1, 1, None).unwrap();

        let records = store.load_by_ids(&[a, 42]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tcn, tcn(1));
    }
}
