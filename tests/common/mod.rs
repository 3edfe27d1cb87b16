//! Shared test fixtures
//!
//! A synthetic NTFS volume-image builder (boot sector,
//! fixup-protected MFT records, cluster payloads) and an in-memory
//! volume access fake for driving the scan and recovery paths
//! without a real device.

#![allow(dead_code)]

use salvage::domain::entities::ScanEngine;
use salvage::domain::repositories::{
    JournalEvent, RawRecord, VolumeAccess, VolumeAccessError, VolumeGeometry,
};
use std::path::Path;

pub const BYTES_PER_SECTOR: usize = 512;
pub const SECTORS_PER_CLUSTER: usize = 8;
pub const CLUSTER_SIZE: usize = BYTES_PER_SECTOR * SECTORS_PER_CLUSTER;
pub const RECORD_SIZE: usize = 1024;
pub const MFT_LCN: u64 = 4;

/// Fixup signature value written into each record's update sequence
const USA_SIGNATURE: [u8; 2] = [0xA5, 0x5A];

/// Builds a minimal but structurally valid NTFS volume image
pub struct NtfsImageBuilder {
    data: Vec<u8>,
    next_record: u64,
}

impl NtfsImageBuilder {
    pub fn new(total_size: usize) -> Self {
        assert!(total_size >= 1024 * 1024, "image too small to be useful");
        let mut data = vec![0u8; total_size];
        write_boot_sector(&mut data, total_size);

        let mut builder = Self {
            data,
            next_record: 0,
        };
        // Record 0 is the $MFT system record itself
        builder.add_record("$MFT", true, false, 0, &[], None);
        builder
    }

    pub fn mft_offset(&self) -> usize {
        MFT_LCN as usize * CLUSTER_SIZE
    }

    /// Writes raw bytes into a cluster
    pub fn write_cluster(&mut self, lcn: u64, bytes: &[u8]) {
        let offset = lcn as usize * CLUSTER_SIZE;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Adds a deleted file whose content is placed at `lcn`
    pub fn add_deleted_file(&mut self, name: &str, content: &[u8], lcn: u64) -> u64 {
        self.write_cluster(lcn, content);
        let clusters = content.len().div_ceil(CLUSTER_SIZE).max(1) as u64;
        self.add_record(
            name,
            false,
            false,
            content.len() as u64,
            &[(Some(lcn), clusters)],
            None,
        )
    }

    /// Adds a deleted file with an explicit run list and size
    pub fn add_deleted_file_with_runs(
        &mut self,
        name: &str,
        size: u64,
        runs: &[(Option<u64>, u64)],
    ) -> u64 {
        self.add_record(name, false, false, size, runs, None)
    }

    /// Adds an in-use (not deleted) file
    pub fn add_active_file(&mut self, name: &str, content: &[u8], lcn: u64) -> u64 {
        self.write_cluster(lcn, content);
        let clusters = content.len().div_ceil(CLUSTER_SIZE).max(1) as u64;
        self.add_record(
            name,
            true,
            false,
            content.len() as u64,
            &[(Some(lcn), clusters)],
            None,
        )
    }

    /// Adds a deleted directory record
    pub fn add_deleted_directory(&mut self, name: &str) -> u64 {
        self.add_record(name, false, true, 0, &[], None)
    }

    /// Adds a deleted file with resident content (stored in-record)
    pub fn add_deleted_resident_file(&mut self, name: &str, content: &[u8]) -> u64 {
        self.add_record(name, false, false, 0, &[], Some(content))
    }

    /// Writes arbitrary bytes as the next record slot (corrupt input)
    pub fn add_raw_record(&mut self, bytes: &[u8]) -> u64 {
        let number = self.next_record;
        let offset = self.mft_offset() + number as usize * RECORD_SIZE;
        let end = (offset + RECORD_SIZE).min(offset + bytes.len());
        self.data[offset..end].copy_from_slice(&bytes[..end - offset]);
        self.next_record += 1;
        number
    }

    /// Tears a record by corrupting one protected sector tail, which
    /// must make the fixup check reject it
    pub fn tear_record(&mut self, record_number: u64) {
        let offset = self.mft_offset() + record_number as usize * RECORD_SIZE;
        self.data[offset + BYTES_PER_SECTOR - 2] ^= 0xFF;
    }

    fn add_record(
        &mut self,
        name: &str,
        in_use: bool,
        directory: bool,
        size: u64,
        runs: &[(Option<u64>, u64)],
        resident_content: Option<&[u8]>,
    ) -> u64 {
        let number = self.next_record;
        let record = build_record(name, in_use, directory, size, runs, resident_content);
        let offset = self.mft_offset() + number as usize * RECORD_SIZE;
        self.data[offset..offset + RECORD_SIZE].copy_from_slice(&record);
        self.next_record += 1;
        number
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    pub fn write_to(self, path: &Path) {
        std::fs::write(path, self.build()).expect("write image");
    }
}

fn write_boot_sector(data: &mut [u8], total_size: usize) {
    data[0] = 0xEB;
    data[1] = 0x52;
    data[2] = 0x90;
    data[3..11].copy_from_slice(b"NTFS    ");
    data[0x0B..0x0D].copy_from_slice(&(BYTES_PER_SECTOR as u16).to_le_bytes());
    data[0x0D] = SECTORS_PER_CLUSTER as u8;
    let total_sectors = (total_size / BYTES_PER_SECTOR) as u64;
    data[0x28..0x30].copy_from_slice(&total_sectors.to_le_bytes());
    data[0x30..0x38].copy_from_slice(&MFT_LCN.to_le_bytes());
    data[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
    data[0x40] = (-10i8) as u8; // 2^10 = 1024-byte records
    data[0x48..0x50].copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
}

/// Builds one fixup-protected MFT record
fn build_record(
    name: &str,
    in_use: bool,
    directory: bool,
    size: u64,
    runs: &[(Option<u64>, u64)],
    resident_content: Option<&[u8]>,
) -> Vec<u8> {
    let mut record = vec![0u8; RECORD_SIZE];
    record[0..4].copy_from_slice(b"FILE");
    record[4..6].copy_from_slice(&48u16.to_le_bytes()); // USA offset
    record[6..8].copy_from_slice(&3u16.to_le_bytes()); // USA count
    record[20..22].copy_from_slice(&56u16.to_le_bytes()); // first attribute

    let mut flags = 0u16;
    if in_use {
        flags |= 0x01;
    }
    if directory {
        flags |= 0x02;
    }
    record[22..24].copy_from_slice(&flags.to_le_bytes());

    let mut at = 56usize;
    at += write_standard_information(&mut record[at..]);
    at += write_file_name(&mut record[at..], name, size);
    if let Some(content) = resident_content {
        at += write_resident_data(&mut record[at..], content);
    } else if !runs.is_empty() {
        at += write_nonresident_data(&mut record[at..], size, runs);
    }
    record[at..at + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

    apply_fixup_for_write(&mut record);
    record
}

/// Saves each protected sector tail into the USA, then stamps the
/// signature over it, the inverse of what the parser undoes
fn apply_fixup_for_write(record: &mut [u8]) {
    record[48..50].copy_from_slice(&USA_SIGNATURE);
    for i in 1..3usize {
        let sector_end = i * BYTES_PER_SECTOR - 2;
        let slot = 48 + i * 2;
        record[slot] = record[sector_end];
        record[slot + 1] = record[sector_end + 1];
        record[sector_end..sector_end + 2].copy_from_slice(&USA_SIGNATURE);
    }
}

fn write_standard_information(buf: &mut [u8]) -> usize {
    const CONTENT_LEN: usize = 48;
    let attr_len = 24 + CONTENT_LEN;
    buf[0..4].copy_from_slice(&0x10u32.to_le_bytes());
    buf[4..8].copy_from_slice(&(attr_len as u32).to_le_bytes());
    buf[8] = 0; // resident
    buf[16..20].copy_from_slice(&(CONTENT_LEN as u32).to_le_bytes());
    buf[20..22].copy_from_slice(&24u16.to_le_bytes());

    // FILETIME for 2024-01-01 00:00:00 UTC
    let filetime = (1_704_067_200i64 + 11_644_473_600) * 10_000_000;
    buf[24..32].copy_from_slice(&filetime.to_le_bytes()); // created
    buf[32..40].copy_from_slice(&filetime.to_le_bytes()); // modified
    buf[48..56].copy_from_slice(&filetime.to_le_bytes()); // accessed
    attr_len
}

fn write_file_name(buf: &mut [u8], name: &str, size: u64) -> usize {
    let name_units: Vec<u16> = name.encode_utf16().collect();
    let content_len = 66 + name_units.len() * 2;
    let attr_len = (24 + content_len).div_ceil(8) * 8;

    buf[0..4].copy_from_slice(&0x30u32.to_le_bytes());
    buf[4..8].copy_from_slice(&(attr_len as u32).to_le_bytes());
    buf[8] = 0; // resident
    buf[16..20].copy_from_slice(&(content_len as u32).to_le_bytes());
    buf[20..22].copy_from_slice(&24u16.to_le_bytes());

    let content = &mut buf[24..];
    content[0..8].copy_from_slice(&5u64.to_le_bytes()); // parent: root
    content[40..48].copy_from_slice(&size.to_le_bytes()); // allocated
    content[48..56].copy_from_slice(&size.to_le_bytes()); // real
    content[64] = name_units.len() as u8;
    content[65] = 1; // Win32 namespace
    for (i, unit) in name_units.iter().enumerate() {
        content[66 + i * 2..68 + i * 2].copy_from_slice(&unit.to_le_bytes());
    }
    attr_len
}

fn write_resident_data(buf: &mut [u8], content: &[u8]) -> usize {
    let attr_len = (24 + content.len()).div_ceil(8) * 8;
    buf[0..4].copy_from_slice(&0x80u32.to_le_bytes());
    buf[4..8].copy_from_slice(&(attr_len as u32).to_le_bytes());
    buf[8] = 0; // resident
    buf[9] = 0; // unnamed
    buf[16..20].copy_from_slice(&(content.len() as u32).to_le_bytes());
    buf[20..22].copy_from_slice(&24u16.to_le_bytes());
    buf[24..24 + content.len()].copy_from_slice(content);
    attr_len
}

fn write_nonresident_data(buf: &mut [u8], size: u64, runs: &[(Option<u64>, u64)]) -> usize {
    let run_list = encode_runs(runs);
    let attr_len = (64 + run_list.len()).div_ceil(8) * 8;
    let total_clusters: u64 = runs.iter().map(|(_, c)| c).sum();

    buf[0..4].copy_from_slice(&0x80u32.to_le_bytes());
    buf[4..8].copy_from_slice(&(attr_len as u32).to_le_bytes());
    buf[8] = 1; // non-resident
    buf[9] = 0; // unnamed
    buf[10..12].copy_from_slice(&64u16.to_le_bytes()); // name offset
    buf[24..32].copy_from_slice(&(total_clusters.saturating_sub(1)).to_le_bytes()); // end VCN
    buf[32..34].copy_from_slice(&64u16.to_le_bytes()); // runs offset
    buf[40..48].copy_from_slice(&(total_clusters * CLUSTER_SIZE as u64).to_le_bytes());
    buf[48..56].copy_from_slice(&size.to_le_bytes());
    buf[56..64].copy_from_slice(&size.to_le_bytes());
    buf[64..64 + run_list.len()].copy_from_slice(&run_list);
    attr_len
}

/// Encodes a run list the way NTFS stores it: packed length/offset
/// nibbles, LCN deltas relative to the previous run
pub fn encode_runs(runs: &[(Option<u64>, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev: i64 = 0;

    for &(lcn, clusters) in runs {
        let length_bytes = unsigned_len(clusters);
        match lcn {
            None => {
                out.push(length_bytes as u8);
                out.extend_from_slice(&clusters.to_le_bytes()[..length_bytes]);
            }
            Some(lcn) => {
                let delta = lcn as i64 - prev;
                prev = lcn as i64;
                let offset_bytes = signed_len(delta);
                out.push(((offset_bytes as u8) << 4) | length_bytes as u8);
                out.extend_from_slice(&clusters.to_le_bytes()[..length_bytes]);
                out.extend_from_slice(&delta.to_le_bytes()[..offset_bytes]);
            }
        }
    }

    out.push(0);
    out
}

fn unsigned_len(value: u64) -> usize {
    for n in 1..8 {
        if value < 1u64 << (8 * n) {
            return n;
        }
    }
    8
}

fn signed_len(value: i64) -> usize {
    for n in 1..8 {
        let half = 1i64 << (8 * n - 1);
        if value >= -half && value < half {
            return n;
        }
    }
    8
}

/// In-memory volume for scan/recovery tests; journal events and read
/// failures are injectable
pub struct FakeVolume {
    pub geometry: VolumeGeometry,
    pub data: Vec<u8>,
    pub events: Vec<JournalEvent>,
    pub engine: ScanEngine,
    pub carving: bool,
    pub fail_reads: bool,
}

impl FakeVolume {
    /// Wraps a built NTFS image
    pub fn from_image(data: Vec<u8>) -> Self {
        let total_size = data.len() as u64;
        Self {
            geometry: VolumeGeometry {
                bytes_per_sector: BYTES_PER_SECTOR as u32,
                cluster_size: CLUSTER_SIZE as u32,
                mft_record_size: RECORD_SIZE as u32,
                total_size,
            },
            data,
            events: Vec::new(),
            engine: ScanEngine::Raw,
            carving: true,
            fail_reads: false,
        }
    }

    /// A mediated-looking volume over the same image
    pub fn mediated(data: Vec<u8>) -> Self {
        let mut volume = Self::from_image(data);
        volume.engine = ScanEngine::Mediated;
        volume.carving = false;
        volume
    }
}

impl VolumeAccess for FakeVolume {
    fn engine(&self) -> ScanEngine {
        self.engine
    }

    fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    fn read_at(&self, offset: u64, length: usize) -> Result<Vec<u8>, VolumeAccessError> {
        if self.fail_reads {
            return Err(VolumeAccessError::Io(std::io::Error::other(
                "simulated device error",
            )));
        }
        let start = offset as usize;
        if start >= self.data.len() {
            return Err(VolumeAccessError::OutOfRange {
                offset,
                size: self.data.len() as u64,
            });
        }
        let end = (start + length).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }

    fn metadata_records(
        &self,
        start: u64,
        count: usize,
    ) -> Result<Vec<RawRecord>, VolumeAccessError> {
        let mft_offset = MFT_LCN as usize * CLUSTER_SIZE;
        let begin = mft_offset + start as usize * RECORD_SIZE;
        if begin >= self.data.len() {
            return Ok(Vec::new());
        }
        let end = (begin + count * RECORD_SIZE).min(self.data.len());
        Ok(self.data[begin..end]
            .chunks_exact(RECORD_SIZE)
            .enumerate()
            .map(|(i, chunk)| RawRecord {
                number: start + i as u64,
                bytes: chunk.to_vec(),
            })
            .collect())
    }

    fn journal_events(&self) -> Result<Vec<JournalEvent>, VolumeAccessError> {
        Ok(self.events.clone())
    }

    fn supports_carving(&self) -> bool {
        self.carving
    }
}

/// A 4 KiB JPEG-shaped payload: valid header, valid footer, noise in
/// between
pub fn jpeg_payload(len: usize) -> Vec<u8> {
    assert!(len >= 8);
    let mut payload = vec![0u8; len];
    payload[0..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
    payload[3] = 0xE0;
    for (i, byte) in payload.iter_mut().enumerate().skip(4).take(len - 6) {
        *byte = (i % 251) as u8;
    }
    payload[len - 2..].copy_from_slice(&[0xFF, 0xD9]);
    payload
}

/// A delete event as the journal scanner would surface it
pub fn delete_event(name: &str, record: u64) -> JournalEvent {
    JournalEvent {
        file_name: name.to_string(),
        record,
        parent_record: 5,
        timestamp: 1_704_067_200,
        attributes: 0x20,
        reason: JournalEvent::REASON_FILE_DELETE,
    }
}
