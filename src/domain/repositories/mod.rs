//! Repository traits
//!
//! Interfaces the domain depends on, implemented by the
//! infrastructure layer.

mod file_sink;
mod volume_access;

pub use file_sink::{RecoveredFileSink, RecoveryWriteError, WriteReceipt};
pub use volume_access::{
    JournalEvent, RawRecord, VolumeAccess, VolumeAccessError, VolumeGeometry,
};
