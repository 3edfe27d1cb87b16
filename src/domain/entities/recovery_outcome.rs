//! Recovery outcome entities
//!
//! Per-file result of a recovery attempt, plus the aggregate for
//! batch recoveries. Immutable once created.

use serde::{Deserialize, Serialize};

/// Tri-state outcome of a single recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStatus {
    /// All cluster reads succeeded and the header check (when the
    /// type is known) passed
    Recovered,
    /// All reads succeeded but the reconstructed header does not
    /// match the expected type signature
    RecoveredWithCorruptionRisk,
    Failed,
}

/// Structured reason for a failed recovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecoveryFailure {
    /// A cluster range read failed; zero-fill substitution is never
    /// performed, so any failed range fails the whole file
    ReadFailed { offset: u64, detail: String },
    WriteFailed { detail: String },
    /// The candidate carries neither cluster runs nor a carve region
    NoClusterInfo,
    DestinationUnavailable { detail: String },
    Cancelled,
}

/// Result of one recovery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub name: String,
    pub status: RecoveryStatus,
    pub bytes_written: u64,
    /// Final destination path when a file was written
    pub destination: Option<String>,
    pub failure: Option<RecoveryFailure>,
}

impl RecoveryOutcome {
    pub fn recovered(name: String, bytes_written: u64, destination: String) -> Self {
        Self {
            name,
            status: RecoveryStatus::Recovered,
            bytes_written,
            destination: Some(destination),
            failure: None,
        }
    }

    pub fn corruption_risk(name: String, bytes_written: u64, destination: String) -> Self {
        Self {
            name,
            status: RecoveryStatus::RecoveredWithCorruptionRisk,
            bytes_written,
            destination: Some(destination),
            failure: None,
        }
    }

    pub fn failed(name: String, failure: RecoveryFailure) -> Self {
        Self {
            name,
            status: RecoveryStatus::Failed,
            bytes_written: 0,
            destination: None,
            failure: Some(failure),
        }
    }
}

/// Aggregate of a batch recovery, outcomes in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryBatchReport {
    pub outcomes: Vec<RecoveryOutcome>,
    pub recovered: usize,
    pub corruption_risk: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub cancelled: bool,
}

impl RecoveryBatchReport {
    /// Builds the aggregate from per-file outcomes
    pub fn from_outcomes(outcomes: Vec<RecoveryOutcome>, cancelled: bool) -> Self {
        let recovered = outcomes
            .iter()
            .filter(|o| o.status == RecoveryStatus::Recovered)
            .count();
        let corruption_risk = outcomes
            .iter()
            .filter(|o| o.status == RecoveryStatus::RecoveredWithCorruptionRisk)
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| o.status == RecoveryStatus::Failed)
            .count();
        let total_bytes = outcomes.iter().map(|o| o.bytes_written).sum();

        Self {
            outcomes,
            recovered,
            corruption_risk,
            failed,
            total_bytes,
            cancelled,
        }
    }
}
