//! Domain entities

mod file_signature;
mod recoverable_file;
mod recovery_outcome;
mod scan_report;
mod volume;

pub use file_signature::{FileSignature, SignatureSummary};
pub use recoverable_file::{
    category_for_extension, estimate_age, type_name_for_extension, CarveRegion, ClusterRun,
    RecoverableFile, RecoverySource,
};
pub use recovery_outcome::{
    RecoveryBatchReport, RecoveryFailure, RecoveryOutcome, RecoveryStatus,
};
pub use scan_report::{
    CarveSkipReason, CarveStop, ProgressEvent, ScanEngine, ScanReport, ScanStage,
};
pub use volume::{EncryptionState, Volume, VolumeSpec};
