//! Recovery use case
//!
//! Single-file and batch recovery. A batch parallelizes across files
//! up to a caller-chosen worker count; each worker owns its own read
//! cursor through the volume lock and writes to a distinct
//! destination path, so the only shared state is an atomic progress
//! counter and the ordered outcome-event channel.

use crate::domain::cancel::CancelToken;
use crate::domain::entities::{
    RecoverableFile, RecoveryBatchReport, RecoveryFailure, RecoveryOutcome, RecoveryStatus,
};
use crate::domain::repositories::{RecoveredFileSink, VolumeAccess};
use crate::domain::services::SignatureRegistry;
use crate::infrastructure::persistence::RecoveryWriter;
use crossbeam_channel::Sender;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// One per-file completion event, streamed during a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryEvent {
    /// Position of the file in the input list
    pub index: usize,
    pub completed: usize,
    pub total: usize,
    pub name: String,
    pub status: RecoveryStatus,
}

/// Recovers candidates against one volume and one destination
pub struct RecoverFilesUseCase<'a> {
    volume: &'a dyn VolumeAccess,
    registry: &'a SignatureRegistry,
    sink: &'a dyn RecoveredFileSink,
}

impl<'a> RecoverFilesUseCase<'a> {
    pub fn new(
        volume: &'a dyn VolumeAccess,
        registry: &'a SignatureRegistry,
        sink: &'a dyn RecoveredFileSink,
    ) -> Self {
        Self {
            volume,
            registry,
            sink,
        }
    }

    /// Recovers a single candidate
    pub fn execute_one(&self, file: &RecoverableFile, cancel: &CancelToken) -> RecoveryOutcome {
        let writer = RecoveryWriter::new(self.volume, self.registry, self.sink);
        writer.recover(file, cancel)
    }

    /// Recovers a batch with bounded parallelism
    ///
    /// Outcomes come back in input order. Files not yet started when
    /// cancellation lands fail with a cancelled reason; the file in
    /// flight either completes under its final name or leaves nothing
    /// behind, never a partial write.
    pub fn execute_batch(
        &self,
        files: &[RecoverableFile],
        parallelism: usize,
        cancel: &CancelToken,
        events: Option<&Sender<RecoveryEvent>>,
    ) -> RecoveryBatchReport {
        let total = files.len();
        let workers = parallelism.clamp(1, 64);
        info!(total, workers, "starting batch recovery");

        let writer = RecoveryWriter::new(self.volume, self.registry, self.sink);
        let completed = AtomicUsize::new(0);

        let recover_one = |(index, file): (usize, &RecoverableFile)| -> RecoveryOutcome {
            let outcome = if cancel.is_cancelled() {
                RecoveryOutcome::failed(file.name.clone(), RecoveryFailure::Cancelled)
            } else {
                writer.recover(file, cancel)
            };

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(tx) = events {
                let _ = tx.send(RecoveryEvent {
                    index,
                    completed: done,
                    total,
                    name: outcome.name.clone(),
                    status: outcome.status,
                });
            }
            outcome
        };

        let outcomes: Vec<RecoveryOutcome> = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
        {
            Ok(pool) => {
                pool.install(|| files.par_iter().enumerate().map(recover_one).collect())
            }
            Err(err) => {
                // No pool, no parallelism; the batch still completes
                warn!(%err, "thread pool construction failed, recovering sequentially");
                files.iter().enumerate().map(recover_one).collect()
            }
        };

        let report = RecoveryBatchReport::from_outcomes(outcomes, cancel.is_cancelled());
        info!(
            recovered = report.recovered,
            corruption_risk = report.corruption_risk,
            failed = report.failed,
            "batch recovery finished"
        );
        report
    }
}
