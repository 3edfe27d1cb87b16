//! NTFS boot sector parser
//!
//! The boot sector carries the volume's sector size, cluster size,
//! and the location of the MFT. Everything else the engine needs is
//! derived from these.

use crate::domain::repositories::{VolumeAccessError, VolumeGeometry};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

/// Boot sector size in bytes
pub const BOOT_SECTOR_SIZE: usize = 512;

/// OEM ID "NTFS    " at offset 3
const NTFS_OEM_ID: &[u8; 8] = b"NTFS    ";

/// Parsed NTFS boot sector (BIOS parameter block subset)
#[derive(Debug, Clone, Copy)]
pub struct BootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    /// Logical cluster number of the MFT's first extent
    pub mft_lcn: u64,
    pub mft_mirror_lcn: u64,
    /// Positive: clusters per record; negative: 2^|n| bytes
    clusters_per_mft_record: i8,
    pub volume_serial: u64,
}

impl BootSector {
    /// Parses and validates a boot sector
    pub fn parse(data: &[u8]) -> Result<Self, VolumeAccessError> {
        if data.len() < BOOT_SECTOR_SIZE {
            return Err(VolumeAccessError::UnsupportedFilesystem(
                "boot sector truncated".to_string(),
            ));
        }

        if &data[3..11] != NTFS_OEM_ID {
            return Err(VolumeAccessError::UnsupportedFilesystem(
                "missing NTFS OEM id".to_string(),
            ));
        }

        let mut cursor = Cursor::new(data);
        let read_err =
            |e: std::io::Error| VolumeAccessError::UnsupportedFilesystem(e.to_string());

        cursor.seek(SeekFrom::Start(0x0B)).map_err(read_err)?;
        let bytes_per_sector = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let sectors_per_cluster = cursor.read_u8().map_err(read_err)?;

        cursor.seek(SeekFrom::Start(0x28)).map_err(read_err)?;
        let total_sectors = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let mft_lcn = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let mft_mirror_lcn = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let clusters_per_mft_record = cursor.read_i8().map_err(read_err)?;

        cursor.seek(SeekFrom::Start(0x48)).map_err(read_err)?;
        let volume_serial = cursor.read_u64::<LittleEndian>().map_err(read_err)?;

        let boot = Self {
            bytes_per_sector,
            sectors_per_cluster,
            total_sectors,
            mft_lcn,
            mft_mirror_lcn,
            clusters_per_mft_record,
            volume_serial,
        };

        if !boot.is_valid() {
            return Err(VolumeAccessError::UnsupportedFilesystem(
                "implausible boot sector parameters".to_string(),
            ));
        }

        Ok(boot)
    }

    fn is_valid(&self) -> bool {
        self.bytes_per_sector >= 512
            && self.bytes_per_sector.is_power_of_two()
            && self.sectors_per_cluster > 0
            && self.total_sectors > 0
    }

    /// Cluster size in bytes
    pub fn cluster_size(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// MFT record size in bytes
    pub fn mft_record_size(&self) -> u32 {
        if self.clusters_per_mft_record > 0 {
            self.cluster_size() * self.clusters_per_mft_record as u32
        } else {
            1u32 << (-self.clusters_per_mft_record as u32)
        }
    }

    /// Byte offset of the MFT's first extent
    pub fn mft_offset(&self) -> u64 {
        self.mft_lcn * self.cluster_size() as u64
    }

    /// Total volume size in bytes
    pub fn volume_size(&self) -> u64 {
        self.total_sectors * self.bytes_per_sector as u64
    }

    /// Geometry snapshot for the volume access layer
    pub fn geometry(&self) -> VolumeGeometry {
        VolumeGeometry {
            bytes_per_sector: self.bytes_per_sector as u32,
            cluster_size: self.cluster_size(),
            mft_record_size: self.mft_record_size(),
            total_size: self.volume_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_boot_sector() -> Vec<u8> {
        let mut data = vec![0u8; BOOT_SECTOR_SIZE];
        data[0] = 0xEB;
        data[1] = 0x52;
        data[2] = 0x90;
        data[3..11].copy_from_slice(b"NTFS    ");
        data[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        data[0x0D] = 8; // 4 KiB clusters
        data[0x28..0x30].copy_from_slice(&20_480u64.to_le_bytes()); // 10 MiB
        data[0x30..0x38].copy_from_slice(&4u64.to_le_bytes()); // MFT at LCN 4
        data[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
        data[0x40] = (-10i8) as u8; // 1024-byte records
        data[0x48..0x50].copy_from_slice(&0xDEAD_BEEFu64.to_le_bytes());
        data
    }

    #[test]
    fn parses_valid_boot_sector() {
        let boot = BootSector::parse(&sample_boot_sector()).unwrap();
        assert_eq!(boot.bytes_per_sector, 512);
        assert_eq!(boot.cluster_size(), 4096);
        assert_eq!(boot.mft_record_size(), 1024);
        assert_eq!(boot.mft_offset(), 4 * 4096);
        assert_eq!(boot.volume_size(), 20_480 * 512);
    }

    #[test]
    fn rejects_missing_oem_id() {
        let mut data = sample_boot_sector();
        data[3..7].copy_from_slice(b"EXT4");
        assert!(matches!(
            BootSector::parse(&data),
            Err(VolumeAccessError::UnsupportedFilesystem(_))
        ));
    }

    #[test]
    fn rejects_truncated_sector() {
        let data = vec![0u8; 100];
        assert!(BootSector::parse(&data).is_err());
    }
}
