//! Recovered-file sink trait
//!
//! Destination side of the recovery path. Implementations must write
//! atomically with respect to the final name: a file either appears
//! complete under its final name or not at all, even under
//! cancellation.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors on the write side of recovery
#[derive(Error, Debug)]
pub enum RecoveryWriteError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("destination unavailable: {0}")]
    DestinationUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receipt for one written file
#[derive(Debug, Clone)]
pub struct WriteReceipt {
    /// Final path, after sanitization and collision suffixing
    pub path: PathBuf,
    pub bytes: u64,
}

/// Trait for writing reconstructed files to a destination
pub trait RecoveredFileSink: Send + Sync {
    /// Writes `data` under a sanitized, collision-free variant of
    /// `preferred_name`, atomically with respect to the final name
    fn write(&self, preferred_name: &str, data: &[u8]) -> Result<WriteReceipt, RecoveryWriteError>;

    /// The destination directory
    fn dest_dir(&self) -> &Path;
}
