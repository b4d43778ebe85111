//! Cooperative cancellation for exposure checks

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag a host sets when the run must stop, for example when the OS
/// background time runs out.
///
/// The pipeline checks it between reports and before every update chunk.
/// Chunks already handed to the store stay committed.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// New, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once any clone called [`cancel`](Self::cancel).
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
