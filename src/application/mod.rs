//! Application layer
//!
//! Use cases orchestrating the domain and infrastructure: one scan
//! invocation, and single/batch recovery.

pub mod dto;
mod engine;
mod recover_files;
mod scan_volume;

pub use engine::select_engine;
pub use recover_files::{RecoverFilesUseCase, RecoveryEvent};
pub use scan_volume::{ProgressSink, ScanVolumeUseCase};
