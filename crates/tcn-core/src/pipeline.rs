//! Exposure check pipeline
//!
//! One run is the single entry point a host scheduler calls; the core does
//! not know why or when it was invoked.
//!
//! ```text
//! [tested positive?] ─► generate report ─► upload
//!         │
//!         ▼
//! download ─► decode ─► verify ─► window ─► self filter
//!                                              │
//!                  ┌───────────────────────────┘
//!                  ▼
//!      expand ─► chunk ─► mark_infectious + pending_exposures
//!                  │                       (one report at a time)
//!                  ▼
//!       Contact per report ─► report exposure ─► mark_exposure_reported
//! ```
//!
//! Bad reports (undecodable, forged, oversized) are logged and skipped; they
//! never stop the batch. Storage or transport failures end the run with one
//! [`CheckError`], keeping any chunks already committed. Replaying a run is
//! safe because flagging is idempotent, and records flagged by a run that
//! never reached the upload stay pending until a later run reports them.

use std::sync::Arc;

use bytes::Bytes;
use tcn_crypto::SignedReport;
use tokio::task::JoinHandle;

use crate::{
    cancel::CancellationFlag,
    config::CheckConfig,
    env::Environment,
    error::CheckError,
    keystore::{SecretKeyStore, TemporaryKeyStore},
    matcher::{Admission, Contact, ExposureMatcher, contact_for_report},
    session::Session,
    storage::{ContactStore, RecordId},
    transport::ReportTransport,
    update::{UpdateGate, mark_infectious_chunked},
};

/// Result of one successful run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOutcome {
    /// Reports fetched from the transport.
    pub reports_downloaded: usize,
    /// Reports dropped as undecodable, forged or outside the window.
    pub reports_rejected: usize,
    /// Reports dropped because they were this device's own.
    pub reports_skipped_self: usize,
    /// Whether this run uploaded the local user's report.
    pub report_uploaded: bool,
    /// Records whose flag changed during this run.
    pub newly_flagged: Vec<RecordId>,
    /// One contact per report with flagged records not yet reported.
    pub contacts: Vec<Contact>,
}

/// The download → verify → match → flag → notify chain.
pub struct ExposureCheck<E, K, T, S, R> {
    session: Arc<Session<E, K, T>>,
    store: S,
    transport: Arc<R>,
    config: CheckConfig,
    gate: UpdateGate,
}

impl<E, K, T, S: Clone, R> Clone for ExposureCheck<E, K, T, S, R> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            store: self.store.clone(),
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<E, K, T, S, R> ExposureCheck<E, K, T, S, R>
where
    E: Environment,
    K: SecretKeyStore,
    T: TemporaryKeyStore,
    S: ContactStore,
    R: ReportTransport,
{
    /// Assemble a pipeline from its collaborators.
    ///
    /// The pipeline gets its own [`UpdateGate`]; clones share it. Use
    /// [`ExposureCheck::with_update_gate`] when separately built pipelines
    /// update the same store.
    pub fn new(session: Arc<Session<E, K, T>>, store: S, transport: Arc<R>, config: CheckConfig) -> Self {
        Self { session, store, transport, config, gate: UpdateGate::new() }
    }

    /// Serialize record updates with every holder of `gate`.
    #[must_use]
    pub fn with_update_gate(mut self, gate: UpdateGate) -> Self {
        self.gate = gate;
        self
    }

    /// The gate this pipeline's record updates hold.
    pub fn update_gate(&self) -> &UpdateGate {
        &self.gate
    }

    /// Run one exposure check to completion or cancellation.
    pub async fn run(&self, cancel: &CancellationFlag) -> Result<CheckOutcome, CheckError> {
        let started = self.session.env().now();
        let mut outcome = CheckOutcome::default();

        if cancel.is_cancelled() {
            return Err(CheckError::Cancelled);
        }

        if self.session.is_tested_positive() {
            let report = self.session.generate_report().await?;
            self.transport.upload_report(Bytes::from(report.to_bytes())).await?;
            outcome.report_uploaded = true;
            tracing::info!("uploaded signed report");
        }

        let downloaded = self.transport.download_reports().await?;
        outcome.reports_downloaded = downloaded.len();

        let matcher = ExposureMatcher::new(self.session.user_id(), self.config.lookback_periods);
        let mut pending_ids = Vec::new();

        for bytes in &downloaded {
            if cancel.is_cancelled() {
                return Err(CheckError::Cancelled);
            }

            let report = match SignedReport::from_bytes(bytes) {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!("skipping undecodable report: {}", e);
                    outcome.reports_rejected += 1;
                    continue;
                },
            };

            match matcher.admit(&report) {
                Admission::Accepted => {},
                Admission::OwnReport => {
                    outcome.reports_skipped_self += 1;
                    continue;
                },
                Admission::InvalidSignature | Admission::OutsideWindow => {
                    outcome.reports_rejected += 1;
                    continue;
                },
            }

            let update = mark_infectious_chunked(
                &self.store,
                report.report().temporary_contact_numbers(),
                self.config.chunk_size,
                &self.gate,
                cancel,
            )
            .await?;

            outcome.newly_flagged.extend(update.newly_flagged);
            outcome.contacts.extend(contact_for_report(report.report(), &update.pending));
            pending_ids.extend(update.pending.iter().map(|record| record.id));
        }

        if !outcome.contacts.is_empty() {
            self.transport.report_exposure(&outcome.contacts).await?;
            self.store.mark_exposure_reported(&pending_ids)?;
        }

        tracing::info!(
            downloaded = outcome.reports_downloaded,
            rejected = outcome.reports_rejected,
            skipped_self = outcome.reports_skipped_self,
            flagged = outcome.newly_flagged.len(),
            contacts = outcome.contacts.len(),
            elapsed_ms = (self.session.env().now() - started).as_millis() as u64,
            "exposure check complete"
        );

        Ok(outcome)
    }

    /// Run on a Tokio task, returning a handle that can cancel it.
    pub fn spawn(&self) -> CheckHandle {
        let cancel = CancellationFlag::new();
        let check = self.clone();
        let flag = cancel.clone();
        let task = tokio::spawn(async move { check.run(&flag).await });

        CheckHandle { cancel, task }
    }
}

/// Handle to a spawned exposure check.
pub struct CheckHandle {
    cancel: CancellationFlag,
    task: JoinHandle<Result<CheckOutcome, CheckError>>,
}

impl CheckHandle {
    /// Ask the run to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the run has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run's result.
    pub async fn join(self) -> Result<CheckOutcome, CheckError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(CheckError::Cancelled),
            Err(e) => Err(CheckError::Task(e.to_string())),
        }
    }
}
