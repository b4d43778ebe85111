//! Report upload/download collaborator
//!
//! Reports travel as their binary wire encoding. Contacts travel as CBOR so a
//! host can forward them to its exposure endpoint unchanged.

#![allow(clippy::disallowed_types, reason = "Lock is never held across an await")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::TransportError, matcher::Contact};

/// Network side of the exposure pipeline.
#[async_trait]
pub trait ReportTransport: Send + Sync + 'static {
    /// Publish this device's encoded signed report.
    async fn upload_report(&self, report: Bytes) -> Result<(), TransportError>;

    /// Fetch every published encoded signed report.
    async fn download_reports(&self) -> Result<Vec<Bytes>, TransportError>;

    /// Tell the backend which reports this device matched.
    async fn report_exposure(&self, contacts: &[Contact]) -> Result<(), TransportError>;
}

/// Shared in-memory bulletin board
///
/// Every clone sees the same reports, so several simulated devices can
/// exchange reports through one board.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    board: Arc<Mutex<Board>>,
    offline: Arc<AtomicBool>,
}

#[derive(Default)]
struct Board {
    reports: Vec<Bytes>,
    exposures: Vec<Bytes>,
}

impl MemoryTransport {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request fail with a connection error (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Post raw bytes as if another device uploaded them.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn publish(&self, report: impl Into<Bytes>) {
        self.board.lock().expect("Mutex poisoned").reports.push(report.into());
    }

    /// Number of reports on the board.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn report_count(&self) -> usize {
        self.board.lock().expect("Mutex poisoned").reports.len()
    }

    /// Decoded exposure batches, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn exposure_batches(&self) -> Result<Vec<Vec<Contact>>, TransportError> {
        let board = self.board.lock().expect("Mutex poisoned");
        board
            .exposures
            .iter()
            .map(|batch| {
                ciborium::from_reader(batch.as_ref())
                    .map_err(|e| TransportError::Encoding(e.to_string()))
            })
            .collect()
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("board offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportTransport for MemoryTransport {
    async fn upload_report(&self, report: Bytes) -> Result<(), TransportError> {
        self.check_online()?;
        if report.is_empty() {
            return Err(TransportError::Rejected("empty report".to_string()));
        }
        self.publish(report);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    async fn download_reports(&self) -> Result<Vec<Bytes>, TransportError> {
        self.check_online()?;
        Ok(self.board.lock().expect("Mutex poisoned").reports.clone())
    }

    #[allow(clippy::expect_used)]
    async fn report_exposure(&self, contacts: &[Contact]) -> Result<(), TransportError> {
        self.check_online()?;

        let mut encoded = Vec::new();
        ciborium::into_writer(contacts, &mut encoded)
            .map_err(|e| TransportError::Encoding(e.to_string()))?;

        self.board.lock().expect("Mutex poisoned").exposures.push(Bytes::from(encoded));
        Ok(())
    }
}
