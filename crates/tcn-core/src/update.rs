//! Chunked infectious-flag updates
//!
//! A report expands to at most a window's worth of numbers, but hosts may
//! back the contact store with a database that limits query size. Numbers are
//! pulled lazily from the report's expansion and handed to the store in
//! chunks of a configured size. Each chunk is its own store call and commits
//! on its own; a cancelled run keeps what it committed.
//!
//! Updates hold an [`UpdateGate`] for the whole report, so at most one
//! report's update is in flight against a store. Pipelines that share a store
//! must share its gate.

use std::sync::Arc;

use tcn_crypto::TemporaryContactNumber;
use tokio::sync::Mutex;

use crate::{
    cancel::CancellationFlag,
    error::CheckError,
    storage::{ContactRecord, ContactStore, RecordId},
};

/// Single-flight lock for record updates against one store.
///
/// Clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct UpdateGate(Arc<Mutex<()>>);

impl UpdateGate {
    /// A fresh, unshared gate.
    pub fn new() -> Self {
        Self::default()
    }
}

/// What one report's update did to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkedUpdate {
    /// Ids whose flag changed from `false` to `true` in this call.
    pub newly_flagged: Vec<RecordId>,
    /// Flagged records among the numbers whose exposure is not yet reported,
    /// whether flagged now or by an earlier run.
    pub pending: Vec<ContactRecord>,
}

/// Flag every stored record whose number appears in `numbers`, and collect
/// the matching records still awaiting an exposure report.
///
/// Numbers already flagged add nothing to `newly_flagged`, so replaying a
/// report is a no-op for the flags. They still show up in `pending` until
/// [`ContactStore::mark_exposure_reported`] records the upload.
///
/// # Errors
///
/// - `Cancelled` if `cancel` is set before a chunk starts
/// - `Storage` if a chunk fails; earlier chunks stay committed
pub async fn mark_infectious_chunked<S, I>(
    store: &S,
    numbers: I,
    chunk_size: usize,
    gate: &UpdateGate,
    cancel: &CancellationFlag,
) -> Result<ChunkedUpdate, CheckError>
where
    S: ContactStore,
    I: IntoIterator<Item = TemporaryContactNumber>,
{
    let _gate = gate.0.lock().await;

    let chunk_size = chunk_size.max(1);
    let mut numbers = numbers.into_iter();
    let mut chunk = Vec::with_capacity(numbers.size_hint().0.min(chunk_size));
    let mut update = ChunkedUpdate::default();
    let mut chunks = 0usize;

    loop {
        if cancel.is_cancelled() {
            tracing::info!(chunks, flagged = update.newly_flagged.len(), "update cancelled between chunks");
            return Err(CheckError::Cancelled);
        }

        chunk.clear();
        chunk.extend(numbers.by_ref().take(chunk_size));
        if chunk.is_empty() {
            break;
        }

        update.newly_flagged.extend(store.mark_infectious(&chunk)?);
        update.pending.extend(store.pending_exposures(&chunk)?);
        chunks += 1;
        tokio::task::yield_now().await;
    }

    tracing::debug!(
        chunks,
        flagged = update.newly_flagged.len(),
        pending = update.pending.len(),
        "infectious update complete"
    );
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryContactStore;

    fn tcn(i: u32) -> TemporaryContactNumber {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&i.to_le_bytes());
        TemporaryContactNumber::from_bytes(bytes)
    }

    #[tokio::test]
    async fn flags_only_known_numbers() {
        let store = MemoryContactStore::new();
        let a = store.upsert(&tcn(1), 0, 0, None).unwrap();
        let b = store.upsert(&tcn(5), 0, 0, None).unwrap();

        let updated =
            mark_infectious_chunked(&store, (0..10).map(tcn), 3, &UpdateGate::new(), &CancellationFlag::new())
                .await
                .unwrap();

        assert_eq!(updated.newly_flagged, vec![a, b]);
        assert_eq!(updated.pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, b]);
    }

    #[tokio::test]
    async fn replay_is_a_no_op() {
        let store = MemoryContactStore::new();
        store.upsert(&tcn(2), 0, 0, None).unwrap();
        let gate = UpdateGate::new();
        let cancel = CancellationFlag::new();

        mark_infectious_chunked(&store, (0..4).map(tcn), 2, &gate, &cancel).await.unwrap();
        let second = mark_infectious_chunked(&store, (0..4).map(tcn), 2, &gate, &cancel).await.unwrap();

        assert!(second.newly_flagged.is_empty());
        assert_eq!(store.infectious_ids().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_touches_nothing() {
        let store = MemoryContactStore::new();
        store.upsert(&tcn(0), 0, 0, None).unwrap();
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = mark_infectious_chunked(&store, (0..4).map(tcn), 2, &UpdateGate::new(), &cancel).await;

        assert_eq!(result, Err(CheckError::Cancelled));
        assert!(store.infectious_ids().is_empty());
    }

    #[tokio::test]
    async fn zero_chunk_size_is_treated_as_one() {
        let store = MemoryContactStore::new();
        store.upsert(&tcn(3), 0, 0, None).unwrap();

        let updated =
            mark_infectious_chunked(&store, (0..5).map(tcn), 0, &UpdateGate::new(), &CancellationFlag::new())
                .await
                .unwrap();
        assert_eq!(updated.newly_flagged.len(), 1);
    }

    #[tokio::test]
    async fn flagged_but_unreported_records_stay_pending() {
        let store = MemoryContactStore::new();
        let id = store.upsert(&tcn(2), 0, 0, None).unwrap();
        let gate = UpdateGate::new();
        let cancel = CancellationFlag::new();

        mark_infectious_chunked(&store, (0..4).map(tcn), 2, &gate, &cancel).await.unwrap();
        let replay = mark_infectious_chunked(&store, (0..4).map(tcn), 2, &gate, &cancel).await.unwrap();
        assert!(replay.newly_flagged.is_empty());
        assert_eq!(replay.pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![id]);

        store.mark_exposure_reported(&[id]).unwrap();
        let reported = mark_infectious_chunked(&store, (0..4).map(tcn), 2, &gate, &cancel).await.unwrap();
        assert!(reported.pending.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shared_gate_admits_one_update_at_a_time() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let gate = UpdateGate::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _held = gate.0.lock().await;
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
