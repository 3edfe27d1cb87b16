//! Recovery confidence scoring
//!
//! Assigns each candidate a 0-100 recoverability estimate. For
//! metadata-index entries the score comes from a *current* check of
//! the first referenced cluster against the expected type signature:
//! a non-empty run list only proves the record kept pointing
//! somewhere, not that the content is still there. Journal-only
//! entries are capped at a fixed baseline regardless of cluster
//! state, because their run information is no longer authoritative.

use crate::domain::entities::{RecoverableFile, RecoverySource};
use crate::domain::repositories::VolumeAccess;
use crate::domain::services::SignatureRegistry;
use tracing::{debug, trace};

/// Score when the first cluster still matches the expected signature
pub const SIGNATURE_MATCH_SCORE: u8 = 85;
/// Score when the first cluster no longer matches; the entry is also
/// flagged likely-overwritten
pub const OVERWRITTEN_SCORE: u8 = 25;
/// Score when no signature is known for the extension, so no content
/// check is possible
pub const UNKNOWN_TYPE_SCORE: u8 = 60;
/// Score for resident files (content stored inside the index record)
pub const RESIDENT_SCORE: u8 = 50;
/// Score when the record carries no content location at all
pub const NO_RUNS_SCORE: u8 = 10;
/// Hard ceiling for journal-only entries
pub const JOURNAL_BASELINE: u8 = 35;
/// Score for footer-confirmed carves
pub const FOOTER_CARVE_SCORE: u8 = 80;
/// Score for fragment-only carves
pub const FRAGMENT_CARVE_SCORE: u8 = 40;
/// Entries scoring below this are considered likely overwritten
pub const LIKELY_OVERWRITTEN_THRESHOLD: u8 = 50;

/// Resident-data size ceiling; NTFS keeps roughly this much inline
const RESIDENT_LIMIT: u64 = 700;

/// Bytes of the first cluster read for the content check
const PROBE_LENGTH: usize = 16;

/// Annotates candidates with recovery confidence
pub struct ConfidenceScorer<'a> {
    registry: &'a SignatureRegistry,
}

impl<'a> ConfidenceScorer<'a> {
    pub fn new(registry: &'a SignatureRegistry) -> Self {
        Self { registry }
    }

    /// Scores one candidate in place, reading the volume when the
    /// source calls for a content check
    pub fn score(&self, file: &mut RecoverableFile, volume: &dyn VolumeAccess) {
        match file.source {
            RecoverySource::MetadataIndex => self.score_metadata(file, volume),
            RecoverySource::Journal => {
                file.confidence = JOURNAL_BASELINE.min(40);
            }
            RecoverySource::Carved => {
                file.confidence = if file.fragment {
                    FRAGMENT_CARVE_SCORE
                } else {
                    FOOTER_CARVE_SCORE
                };
            }
        }
    }

    fn score_metadata(&self, file: &mut RecoverableFile, volume: &dyn VolumeAccess) {
        let Some(run) = file.first_physical_run() else {
            file.confidence = if file.cluster_runs.is_empty()
                && file.size > 0
                && file.size < RESIDENT_LIMIT
            {
                RESIDENT_SCORE
            } else {
                NO_RUNS_SCORE
            };
            return;
        };

        // The run list is non-empty here, so lcn is present
        let lcn = run.lcn.unwrap_or(0);
        let offset = lcn * volume.geometry().cluster_size as u64;

        let probe = match volume.read_at(offset, PROBE_LENGTH) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(id = %file.id, %err, "first-cluster probe failed");
                file.confidence = OVERWRITTEN_SCORE;
                return;
            }
        };

        match self.registry.header_matches(&file.extension, &probe) {
            Some(true) => {
                trace!(id = %file.id, "first cluster matches expected signature");
                file.confidence = SIGNATURE_MATCH_SCORE;
            }
            Some(false) => {
                debug!(id = %file.id, ext = %file.extension, "first cluster does not match signature");
                file.confidence = OVERWRITTEN_SCORE;
                file.likely_overwritten = true;
            }
            None => {
                file.confidence = UNKNOWN_TYPE_SCORE;
            }
        }
    }
}
