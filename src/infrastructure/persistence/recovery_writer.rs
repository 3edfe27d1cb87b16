//! Recovery writer
//!
//! Reads a candidate's content back from the volume and hands it to
//! the sink. The failure rules are strict: if any cluster-range read
//! fails, the whole recovery fails with a structured reason, because
//! a zero-filled file is not a recovered file. Sparse runs are the
//! one exception: a sparse extent *is* zeros on a healthy volume, so
//! zeros are its faithful content.

use crate::domain::cancel::CancelToken;
use crate::domain::entities::{RecoverableFile, RecoveryFailure, RecoveryOutcome};
use crate::domain::repositories::{RecoveredFileSink, VolumeAccess};
use crate::domain::services::SignatureRegistry;
use tracing::{debug, warn};

/// Reconstructs single candidates against one volume and one sink
pub struct RecoveryWriter<'a> {
    volume: &'a dyn VolumeAccess,
    registry: &'a SignatureRegistry,
    sink: &'a dyn RecoveredFileSink,
}

impl<'a> RecoveryWriter<'a> {
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

    /// Recovers one candidate to the sink
    pub fn recover(&self, file: &RecoverableFile, cancel: &CancelToken) -> RecoveryOutcome {
        if cancel.is_cancelled() {
            return RecoveryOutcome::failed(file.name.clone(), RecoveryFailure::Cancelled);
        }

        let data = match self.read_content(file, cancel) {
            Ok(data) => data,
            Err(failure) => {
                warn!(id = %file.id, ?failure, "recovery read failed");
                return RecoveryOutcome::failed(file.name.clone(), failure);
            }
        };

        // Post-read header check; a known type whose header no longer
        // matches is surfaced distinctly, not silently
        let header_ok = self
            .registry
            .header_matches(&file.extension, &data)
            .unwrap_or(true);

        match self.sink.write(&file.name, &data) {
            Ok(receipt) => {
                debug!(id = %file.id, path = %receipt.path.display(), "candidate recovered");
                let destination = receipt.path.display().to_string();
                if header_ok {
                    RecoveryOutcome::recovered(file.name.clone(), receipt.bytes, destination)
                } else {
                    RecoveryOutcome::corruption_risk(file.name.clone(), receipt.bytes, destination)
                }
            }
            Err(err) => RecoveryOutcome::failed(
                file.name.clone(),
                RecoveryFailure::WriteFailed {
                    detail: err.to_string(),
                },
            ),
        }
    }

    /// Reads every content range; any failed range fails the file
    fn read_content(
        &self,
        file: &RecoverableFile,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, RecoveryFailure> {
        if let Some(region) = file.carve_region {
            return self
                .volume
                .read_at(region.offset, region.length as usize)
                .map_err(|e| RecoveryFailure::ReadFailed {
                    offset: region.offset,
                    detail: e.to_string(),
                });
        }

        if file.cluster_runs.is_empty() {
            return Err(RecoveryFailure::NoClusterInfo);
        }

        let cluster_size = self.volume.geometry().cluster_size as u64;
        let mut data = Vec::with_capacity(file.size as usize);
        let mut remaining = file.size;

        for run in &file.cluster_runs {
            if cancel.is_cancelled() {
                return Err(RecoveryFailure::Cancelled);
            }
            if remaining == 0 {
                break;
            }

            let run_bytes = (run.clusters * cluster_size).min(remaining);
            match run.lcn {
                // Sparse extent: defined to be zeros on disk
                None => {
                    let new_len = data.len() + run_bytes as usize;
                    data.resize(new_len, 0);
                }
                Some(lcn) => {
                    let offset = lcn * cluster_size;
                    let bytes = self
                        .volume
                        .read_at(offset, (run.clusters * cluster_size) as usize)
                        .map_err(|e| RecoveryFailure::ReadFailed {
                            offset,
                            detail: e.to_string(),
                        })?;
                    if (bytes.len() as u64) < run_bytes {
                        return Err(RecoveryFailure::ReadFailed {
                            offset,
                            detail: format!(
                                "short read: wanted {run_bytes} bytes, got {}",
                                bytes.len()
                            ),
                        });
                    }
                    data.extend_from_slice(&bytes[..run_bytes as usize]);
                }
            }
            remaining -= run_bytes;
        }

        data.truncate(file.size as usize);
        Ok(data)
    }
}
