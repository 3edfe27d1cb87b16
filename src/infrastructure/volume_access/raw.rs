//! Raw volume access
//!
//! Reads physical sectors through a read-only handle, either a live
//! volume (`\\.\C:`) or a raw image file. Image files behave
//! identically to devices, which keeps the whole raw path testable
//! without privileges.

use crate::domain::entities::{ScanEngine, VolumeSpec};
use crate::domain::repositories::{
    JournalEvent, RawRecord, VolumeAccess, VolumeAccessError, VolumeGeometry,
};
use crate::infrastructure::file_systems::ntfs::BootSector;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raw sector engine; exclusively owns the open handle for the
/// engine's lifetime
pub struct RawVolume {
    file: Mutex<File>,
    path: PathBuf,
    live_volume: bool,
    boot: BootSector,
    geometry: VolumeGeometry,
}

impl RawVolume {
    /// Opens a volume or image for raw access and validates its boot
    /// sector
    pub fn open(spec: &VolumeSpec) -> Result<Self, VolumeAccessError> {
        let path = spec.raw_path();
        let mut file = open_readonly(&path)?;

        let device_size = probe_size(&mut file);

        let mut boot_buf = vec![0u8; crate::infrastructure::file_systems::ntfs::BOOT_SECTOR_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut boot_buf).map_err(|e| {
            VolumeAccessError::VolumeUnavailable(format!(
                "cannot read boot sector of {}: {e}",
                path.display()
            ))
        })?;

        let boot = BootSector::parse(&boot_buf)?;
        let mut geometry = boot.geometry();
        // Trust the smaller of the boot sector's claim and what the
        // handle can actually address (truncated images)
        if device_size > 0 && device_size < geometry.total_size {
            geometry.total_size = device_size;
        }

        debug!(
            path = %path.display(),
            cluster_size = geometry.cluster_size,
            mft_offset = boot.mft_offset(),
            total_size = geometry.total_size,
            "raw volume opened"
        );

        Ok(Self {
            file: Mutex::new(file),
            path,
            live_volume: spec.is_live_volume(),
            boot,
            geometry,
        })
    }

    /// Byte offset of the MFT's first extent
    pub fn mft_offset(&self) -> u64 {
        self.boot.mft_offset()
    }
}

impl VolumeAccess for RawVolume {
    fn engine(&self) -> ScanEngine {
        ScanEngine::Raw
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

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; to_read];
        let mut filled = 0usize;
        while filled < to_read {
            match file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io_error(e, &self.path)),
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
        let offset = self.boot.mft_offset() + start * record_size;
        if offset >= self.geometry.total_size {
            return Ok(Vec::new());
        }

        let bytes = self.read_at(offset, count * record_size as usize)?;
        let records = bytes
            .chunks_exact(record_size as usize)
            .enumerate()
            .map(|(i, chunk)| RawRecord {
                number: start + i as u64,
                bytes: chunk.to_vec(),
            })
            .collect();
        Ok(records)
    }

    fn journal_events(&self) -> Result<Vec<JournalEvent>, VolumeAccessError> {
        #[cfg(windows)]
        if self.live_volume {
            let file = self.file.lock();
            return super::win::read_usn_journal(&file);
        }

        // Image files carry no queryable change journal
        if !self.live_volume {
            debug!(path = %self.path.display(), "image volume, no change journal");
        }
        Ok(Vec::new())
    }

    fn supports_carving(&self) -> bool {
        true
    }
}

#[cfg(windows)]
fn open_readonly(path: &Path) -> Result<File, VolumeAccessError> {
    use std::os::windows::fs::OpenOptionsExt;
    use windows_sys::Win32::Storage::FileSystem::{FILE_SHARE_READ, FILE_SHARE_WRITE};

    OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
        .open(path)
        .map_err(|e| map_io_error(e, path))
}

#[cfg(not(windows))]
fn open_readonly(path: &Path) -> Result<File, VolumeAccessError> {
    OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| map_io_error(e, path))
}

fn map_io_error(error: std::io::Error, path: &Path) -> VolumeAccessError {
    match error.kind() {
        std::io::ErrorKind::PermissionDenied => VolumeAccessError::AccessBlocked(format!(
            "{}: {error}; administrator privileges are required for raw volume access",
            path.display()
        )),
        std::io::ErrorKind::NotFound => {
            VolumeAccessError::VolumeUnavailable(format!("{}: {error}", path.display()))
        }
        _ => VolumeAccessError::Io(error),
    }
}

/// Size of the underlying device or image; regular-file metadata
/// first, seek-to-end as the device fallback
fn probe_size(file: &mut File) -> u64 {
    if let Ok(meta) = file.metadata() {
        if meta.is_file() && meta.len() > 0 {
            return meta.len();
        }
    }
    file.seek(SeekFrom::End(0)).unwrap_or(0)
}
