//! Mediated volume access (Windows)
//!
//! Serves encrypted-but-unlocked volumes, where raw sectors hold
//! ciphertext even though the filesystem is mounted. Metadata records
//! come from `$MFT` opened with backup semantics; journal entries
//! come from the USN FSCTLs; cluster reads go through the mounted
//! volume handle, which sits below the filesystem but above the
//! decryption layer.

use crate::domain::entities::{ScanEngine, VolumeSpec};
use crate::domain::repositories::{
    JournalEvent, RawRecord, VolumeAccess, VolumeAccessError, VolumeGeometry,
};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::os::windows::fs::OpenOptionsExt;
use tracing::debug;
use windows_sys::Win32::Storage::FileSystem::{
    FILE_FLAG_BACKUP_SEMANTICS, FILE_SHARE_READ, FILE_SHARE_WRITE,
};

/// OS-mediated engine; owns both the volume handle and the `$MFT`
/// handle for the scan's lifetime
pub struct MediatedVolume {
    volume: Mutex<File>,
    mft: Mutex<File>,
    geometry: VolumeGeometry,
    /// Valid bytes in $MFT, bounding the record walk
    mft_valid_length: u64,
    drive: String,
}

impl MediatedVolume {
    /// Opens the mediated engine for a live volume
    pub fn open(spec: &VolumeSpec) -> Result<Self, VolumeAccessError> {
        let Some(drive) = spec.drive() else {
            return Err(VolumeAccessError::Unsupported("mediated"));
        };

        if let Err(err) = super::win::enable_backup_privilege() {
            debug!(%err, "backup privilege not acquired, continuing");
        }

        let volume_path = format!("\\\\.\\{drive}");
        let volume = OpenOptions::new()
            .read(true)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
            .open(&volume_path)
            .map_err(|e| {
                VolumeAccessError::VolumeUnavailable(format!("{volume_path}: {e}"))
            })?;

        let (geometry, mft_valid_length) = super::win::ntfs_volume_data(&volume)?;

        let mft_path = format!("\\\\.\\{drive}\\$MFT");
        let mft = OpenOptions::new()
            .read(true)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
            .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
            .open(&mft_path)
            .map_err(|e| {
                VolumeAccessError::AccessBlocked(format!(
                    "{mft_path}: {e}; $MFT requires backup semantics and elevation"
                ))
            })?;

        debug!(
            drive = %drive,
            cluster_size = geometry.cluster_size,
            mft_valid_length,
            "mediated volume opened"
        );

        Ok(Self {
            volume: Mutex::new(volume),
            mft: Mutex::new(mft),
            geometry,
            mft_valid_length,
            drive,
        })
    }

    /// Drive this engine serves, e.g. "C:"
    pub fn drive(&self) -> &str {
        &self.drive
    }
}

impl VolumeAccess for MediatedVolume {
    fn engine(&self) -> ScanEngine {
        ScanEngine::Mediated
    }

    fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>, VolumeAccessError> {
        if offset >= self.geometry.total_size {
            return Err(VolumeAccessError::OutOfRange {
                offset,
                size: self.geometry.total_size,
            });
        }

        let available = (self.geometry.total_size - offset) as usize;
        let to_read = length.min(available);

        let mut volume = self.volume.lock();
        volume.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; to_read];
        let mut filled = 0usize;
        while filled < to_read {
            match volume.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(VolumeAccessError::Io(e)),
            }
        }
        buffer.truncate(filled);
        Ok(buffer)
    }

    fn metadata_records(
        &self,
        start: u64,
        count: usize,
    ) -> Result<Vec<RawRecord>, VolumeAccessError> {
        let record_size = self.geometry.mft_record_size as u64;
        let offset = start * record_size;
        if self.mft_valid_length > 0 && offset >= self.mft_valid_length {
            return Ok(Vec::new());
        }

        let mut remaining = (count as u64 * record_size) as usize;
        if self.mft_valid_length > 0 {
            remaining = remaining.min((self.mft_valid_length - offset) as usize);
        }

        let mut mft = self.mft.lock();
        mft.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; remaining];
        let mut filled = 0usize;
        while filled < remaining {
            match mft.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(VolumeAccessError::Io(e)),
            }
        }
        buffer.truncate(filled);

        Ok(buffer
            .chunks_exact(record_size as usize)
            .enumerate()
            .map(|(i, chunk)| RawRecord {
                number: start + i as u64,
                bytes: chunk.to_vec(),
            })
            .collect())
    }

    fn journal_events(&self) -> Result<Vec<JournalEvent>, VolumeAccessError> {
        let volume = self.volume.lock();
        super::win::read_usn_journal(&volume)
    }

    /// Raw sector contents are ciphertext on this path; carving over
    /// them would only find noise
    fn supports_carving(&self) -> bool {
        false
    }
}
