//! USN change journal parsing
//!
//! Decodes USN_RECORD_V2 batches as returned by
//! FSCTL_READ_USN_JOURNAL. The journal is the only trace of files
//! whose MFT slot has already been recycled, so the scanner keeps
//! going past individual malformed records.

use crate::domain::repositories::JournalEvent;
use super::record::filetime_to_unix;

/// Minimum size of a USN_RECORD_V2 header
const RECORD_HEADER_LEN: usize = 60;

/// Parses one FSCTL_READ_USN_JOURNAL output buffer
///
/// The first eight bytes carry the USN to resume from; the rest is a
/// packed sequence of variable-length records. Returns the resume USN
/// and every decodable event; filtering (deletes only, no
/// directories) is the caller's concern.
pub fn parse_usn_batch(buffer: &[u8]) -> (i64, Vec<JournalEvent>) {
    if buffer.len() < 8 {
        return (0, Vec::new());
    }

    let next_usn = i64::from_le_bytes([
        buffer[0], buffer[1], buffer[2], buffer[3], buffer[4], buffer[5], buffer[6], buffer[7],
    ]);

    let mut events = Vec::new();
    let mut offset = 8usize;

    while offset + RECORD_HEADER_LEN <= buffer.len() {
        let record_length = u32::from_le_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]) as usize;

        if record_length < RECORD_HEADER_LEN || offset + record_length > buffer.len() {
            break;
        }
        let record = &buffer[offset..offset + record_length];

        if let Some(event) = parse_record(record) {
            events.push(event);
        }

        offset += record_length;
    }

    (next_usn, events)
}

/// Decodes one USN_RECORD_V2
fn parse_record(record: &[u8]) -> Option<JournalEvent> {
    let file_ref = u64::from_le_bytes(record.get(8..16)?.try_into().ok()?);
    let parent_ref = u64::from_le_bytes(record.get(16..24)?.try_into().ok()?);
    let timestamp = i64::from_le_bytes(record.get(32..40)?.try_into().ok()?);
    let reason = u32::from_le_bytes(record.get(40..44)?.try_into().ok()?);
    let attributes = u32::from_le_bytes(record.get(52..56)?.try_into().ok()?);
    let name_length = u16::from_le_bytes(record.get(56..58)?.try_into().ok()?) as usize;
    let name_offset = u16::from_le_bytes(record.get(58..60)?.try_into().ok()?) as usize;

    if name_length == 0 || name_length % 2 != 0 {
        return None;
    }
    let name_bytes = record.get(name_offset..name_offset + name_length)?;
    let name_units: Vec<u16> = name_bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Some(JournalEvent {
        file_name: String::from_utf16_lossy(&name_units),
        // Record number is the low 48 bits; the high 16 are a
        // sequence counter
        record: file_ref & 0x0000_FFFF_FFFF_FFFF,
        parent_record: parent_ref & 0x0000_FFFF_FFFF_FFFF,
        timestamp: filetime_to_unix(timestamp),
        attributes,
        reason,
    })
}

/// Builds one USN_RECORD_V2; shared by tests and fixtures
#[doc(hidden)]
pub fn encode_usn_record(
    file_ref: u64,
    parent_ref: u64,
    timestamp_filetime: i64,
    reason: u32,
    attributes: u32,
    name: &str,
) -> Vec<u8> {
    let name_units: Vec<u16> = name.encode_utf16().collect();
    let name_bytes: Vec<u8> = name_units.iter().flat_map(|u| u.to_le_bytes()).collect();
    let name_offset = 60u16;
    // Records are 8-byte aligned on disk
    let raw_len = 60 + name_bytes.len();
    let record_length = raw_len.div_ceil(8) * 8;

    let mut record = vec![0u8; record_length];
    record[0..4].copy_from_slice(&(record_length as u32).to_le_bytes());
    record[4..6].copy_from_slice(&2u16.to_le_bytes()); // major version
    record[8..16].copy_from_slice(&file_ref.to_le_bytes());
    record[16..24].copy_from_slice(&parent_ref.to_le_bytes());
    record[32..40].copy_from_slice(&timestamp_filetime.to_le_bytes());
    record[40..44].copy_from_slice(&reason.to_le_bytes());
    record[52..56].copy_from_slice(&attributes.to_le_bytes());
    record[56..58].copy_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    record[58..60].copy_from_slice(&name_offset.to_le_bytes());
    record[60..60 + name_bytes.len()].copy_from_slice(&name_bytes);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delete_event() {
        let mut buffer = 99i64.to_le_bytes().to_vec();
        buffer.extend(encode_usn_record(
            (7u64 << 48) | 1234,
            5,
            132_223_104_000_000_000,
            JournalEvent::REASON_FILE_DELETE,
            0,
            "report.pdf",
        ));

        let (next_usn, events) = parse_usn_batch(&buffer);
        assert_eq!(next_usn, 99);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.file_name, "report.pdf");
        assert_eq!(event.record, 1234); // sequence bits masked off
        assert_eq!(event.parent_record, 5);
        assert!(event.is_delete());
        assert!(!event.is_directory());
    }

    #[test]
    fn tolerates_truncated_tail() {
        let mut buffer = 0i64.to_le_bytes().to_vec();
        buffer.extend(encode_usn_record(1, 2, 0, JournalEvent::REASON_FILE_DELETE, 0, "a.txt"));
        buffer.extend_from_slice(&[0x40, 0x00, 0x00, 0x00, 0x02]); // claims 64 bytes, has 5

        let (_, events) = parse_usn_batch(&buffer);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let (next_usn, events) = parse_usn_batch(&[]);
        assert_eq!(next_usn, 0);
        assert!(events.is_empty());
    }
}
