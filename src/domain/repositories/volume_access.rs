//! Volume access trait
//!
//! One capability contract satisfied by two implementations: a raw
//! engine reading physical sectors, and a mediated engine that asks
//! the OS for metadata records and journal entries when raw access is
//! not viable. The implementation exclusively owns the open volume
//! handle for the engine's lifetime; every other component borrows
//! read access through this trait.

use crate::domain::entities::ScanEngine;
use std::io;
use thiserror::Error;

/// Errors crossing the volume access boundary
#[derive(Error, Debug)]
pub enum VolumeAccessError {
    #[error("volume unavailable: {0}")]
    VolumeUnavailable(String),

    #[error("unsupported filesystem: {0}")]
    UnsupportedFilesystem(String),

    /// Raw reads were denied; the orchestrator falls back to the
    /// mediated engine instead of returning silent empty results
    #[error("raw access blocked: {0}")]
    AccessBlocked(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("read past end of volume: offset {offset}, volume size {size}")]
    OutOfRange { offset: u64, size: u64 },

    #[error("operation not supported by the {0} engine")]
    Unsupported(&'static str),
}

/// Fixed parameters of the volume, read once from the boot sector or
/// queried from the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u32,
    pub cluster_size: u32,
    pub mft_record_size: u32,
    pub total_size: u64,
}

impl VolumeGeometry {
    /// Total number of addressable sectors
    pub fn total_sectors(&self) -> u64 {
        self.total_size / self.bytes_per_sector as u64
    }
}

/// One undecoded metadata record as stored on the volume
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub number: u64,
    pub bytes: Vec<u8>,
}

/// One change-journal event, already decoded from the on-disk format
#[derive(Debug, Clone)]
pub struct JournalEvent {
    pub file_name: String,
    /// Metadata record id (low 48 bits of the file reference)
    pub record: u64,
    pub parent_record: u64,
    /// Event time as a unix timestamp, 0 when unknown
    pub timestamp: i64,
    /// Raw file attribute bits from the journal record
    pub attributes: u32,
    /// Raw reason bits from the journal record
    pub reason: u32,
}

impl JournalEvent {
    const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
    /// USN_REASON_FILE_DELETE
    pub const REASON_FILE_DELETE: u32 = 0x0000_0200;

    pub fn is_directory(&self) -> bool {
        self.attributes & Self::FILE_ATTRIBUTE_DIRECTORY != 0
    }

    pub fn is_delete(&self) -> bool {
        self.reason & Self::REASON_FILE_DELETE != 0
    }
}

/// Capability set for reading a volume during a scan
///
/// `read_at` serves the carver and the recovery writer;
/// `metadata_records` serves the metadata parser; `journal_events`
/// serves the journal scanner. Implementations that cannot satisfy a
/// capability return an error rather than fabricating data.
pub trait VolumeAccess: Send + Sync {
    /// Which engine this implementation is
    fn engine(&self) -> ScanEngine;

    /// Fixed volume parameters
    fn geometry(&self) -> &VolumeGeometry;

    /// Total volume size in bytes
    fn size(&self) -> u64 {
        self.geometry().total_size
    }

    /// Reads `length` bytes at an absolute byte offset; a read at the
    /// end of the volume returns the bytes that exist
    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>, VolumeAccessError>;

    /// Reads up to `count` metadata records starting at record
    /// `start`; fewer records mean the end of the index was reached
    fn metadata_records(
        &self,
        start: u64,
        count: usize,
    ) -> Result<Vec<RawRecord>, VolumeAccessError>;

    /// Reads the change journal; empty when the volume has none
    fn journal_events(&self) -> Result<Vec<JournalEvent>, VolumeAccessError>;

    /// Whether raw sector contents are trustworthy enough to carve
    fn supports_carving(&self) -> bool;

    /// Reads a run of whole clusters
    fn read_clusters(&self, lcn: u64, count: u64) -> Result<Vec<u8>, VolumeAccessError> {
        let cluster_size = self.geometry().cluster_size as u64;
        let offset = lcn * cluster_size;
        let length = count * cluster_size;
        self.read_at(offset, length as usize)
    }
}
