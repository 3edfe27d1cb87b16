//! Scan report entity
//!
//! The aggregate returned by one scan invocation. Created once per
//! scan, never mutated after being returned; a new scan supersedes it.

use super::recoverable_file::RecoverableFile;
use super::volume::EncryptionState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which volume access engine served the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanEngine {
    /// Raw sector reads against the volume or image
    Raw,
    /// OS-mediated metadata and journal queries (encrypted volumes)
    Mediated,
}

/// Scan stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStage {
    Metadata,
    Journal,
    Carving,
}

/// Why the carving pass was skipped entirely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CarveSkipReason {
    /// Volume is encrypted; raw sectors hold ciphertext even while
    /// the volume is mounted and unlocked
    EncryptedVolume,
    /// Raw access was denied and the scan fell back to the mediated
    /// engine
    RawAccessBlocked,
}

/// Which cap terminated the carving pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CarveStop {
    SectorLimit,
    TimeLimit,
    ResultLimit,
    EndOfVolume,
    Cancelled,
}

/// One progress event, emitted as a line on stderr during execution
///
/// Events are monotonically increasing within a stage; at least one is
/// emitted per stage transition, and carving emits periodic events
/// proportional to sectors scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: ScanStage,
    /// Completion percentage when the stage total is known
    pub percent: Option<f32>,
    /// Records (metadata/journal) or sectors (carving) seen so far
    pub records_seen: u64,
    /// Candidates found so far across all stages
    pub files_found: usize,
}

/// Result of a complete scan invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub success: bool,
    pub message: String,
    /// Engine that served the scan; absent when the scan failed before
    /// an engine could be selected
    pub engine: Option<ScanEngine>,
    pub scan_mode: String,
    pub volume: String,
    pub encryption: EncryptionState,
    /// Candidates from deleted metadata-index records
    pub metadata_entries: Vec<RecoverableFile>,
    /// Candidates found by sector carving
    pub carved_entries: Vec<RecoverableFile>,
    /// Candidates found only in the change journal
    pub journal_entries: Vec<RecoverableFile>,
    pub total_files: usize,
    pub total_recoverable_size: u64,
    /// Candidate counts per browse category
    pub category_counts: BTreeMap<String, usize>,
    pub scan_duration_ms: u64,
    pub mft_records_scanned: u64,
    /// Malformed records tolerated and skipped during parsing
    pub records_skipped: u64,
    pub sectors_scanned: u64,
    /// True when carving was requested but could not run; the reason
    /// is structured, not a textual note
    pub carving_skipped: bool,
    pub carving_skipped_reason: Option<CarveSkipReason>,
    /// Which cap terminated carving, when the pass ran
    pub carve_stop: Option<CarveStop>,
    /// Raw access required administrator privileges that were missing
    pub requires_admin: bool,
    pub cancelled: bool,
}

impl ScanReport {
    /// Creates an empty report for a scan that is about to run
    pub fn started(volume: String, scan_mode: &str, encryption: EncryptionState) -> Self {
        Self {
            success: true,
            message: String::new(),
            engine: None,
            scan_mode: scan_mode.to_string(),
            volume,
            encryption,
            metadata_entries: Vec::new(),
            carved_entries: Vec::new(),
            journal_entries: Vec::new(),
            total_files: 0,
            total_recoverable_size: 0,
            category_counts: BTreeMap::new(),
            scan_duration_ms: 0,
            mft_records_scanned: 0,
            records_skipped: 0,
            sectors_scanned: 0,
            carving_skipped: false,
            carving_skipped_reason: None,
            carve_stop: None,
            requires_admin: false,
            cancelled: false,
        }
    }

    /// Creates a failure report for a scan that could not run
    pub fn failure(
        volume: String,
        scan_mode: &str,
        encryption: EncryptionState,
        message: String,
    ) -> Self {
        let mut report = Self::started(volume, scan_mode, encryption);
        report.success = false;
        report.message = message;
        report
    }

    /// Recomputes totals and category counts from the entry lists
    pub fn finalize(&mut self) {
        self.total_files =
            self.metadata_entries.len() + self.carved_entries.len() + self.journal_entries.len();

        let mut total_size = 0u64;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in self.all_entries() {
            total_size = total_size.saturating_add(entry.size);
            *counts.entry(entry.category.clone()).or_insert(0) += 1;
        }
        self.total_recoverable_size = total_size;
        self.category_counts = counts;
    }

    /// Iterates all candidates across the three sources
    pub fn all_entries(&self) -> impl Iterator<Item = &RecoverableFile> {
        self.metadata_entries
            .iter()
            .chain(self.carved_entries.iter())
            .chain(self.journal_entries.iter())
    }
}
