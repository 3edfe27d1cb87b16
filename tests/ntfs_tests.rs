//! NTFS structure parser tests
//!
//! Boot sector and MFT record decoding against synthetic volume
//! images built by the shared fixture.

mod common;

use common::{NtfsImageBuilder, CLUSTER_SIZE, MFT_LCN, RECORD_SIZE};
use rstest::*;
use salvage::infrastructure::file_systems::ntfs::{BootSector, MftRecord, RunListEntry};

const IMAGE_SIZE: usize = 4 * 1024 * 1024;

#[fixture]
fn image() -> NtfsImageBuilder {
    NtfsImageBuilder::new(IMAGE_SIZE)
}

fn record_bytes(image: &[u8], number: u64) -> &[u8] {
    let offset = MFT_LCN as usize * CLUSTER_SIZE + number as usize * RECORD_SIZE;
    &image[offset..offset + RECORD_SIZE]
}

#[rstest]
fn boot_sector_round_trip(image: NtfsImageBuilder) {
    let data = image.build();
    let boot = BootSector::parse(&data[..512]).unwrap();

    assert_eq!(boot.bytes_per_sector, 512);
    assert_eq!(boot.cluster_size(), CLUSTER_SIZE as u32);
    assert_eq!(boot.mft_record_size(), RECORD_SIZE as u32);
    assert_eq!(boot.mft_offset(), MFT_LCN * CLUSTER_SIZE as u64);
    assert_eq!(boot.volume_size(), IMAGE_SIZE as u64);
}

#[rstest]
fn deleted_file_record_decodes(mut image: NtfsImageBuilder) {
    let content = common::jpeg_payload(4096);
    let number = image.add_deleted_file("photo.jpg", &content, 100);
    let data = image.build();

    let record = MftRecord::parse(record_bytes(&data, number), number, 512).unwrap();
    assert_eq!(record.name, "photo.jpg");
    assert_eq!(record.extension(), "jpg");
    assert_eq!(record.size, 4096);
    assert!(record.is_deleted());
    assert!(!record.is_directory);
    assert!(!record.is_system());
    assert_eq!(
        record.runs,
        vec![RunListEntry {
            lcn: Some(100),
            clusters: 1
        }]
    );
    // Builder stamps 2024-01-01 into $STANDARD_INFORMATION
    assert_eq!(record.created, 1_704_067_200);
    assert_eq!(record.modified, 1_704_067_200);
}

#[rstest]
fn in_use_record_is_not_deleted(mut image: NtfsImageBuilder) {
    let number = image.add_active_file("active.txt", b"still here", 101);
    let data = image.build();

    let record = MftRecord::parse(record_bytes(&data, number), number, 512).unwrap();
    assert!(record.is_in_use);
    assert!(!record.is_deleted());
}

#[rstest]
fn directory_flag_decodes(mut image: NtfsImageBuilder) {
    let number = image.add_deleted_directory("olddir");
    let data = image.build();

    let record = MftRecord::parse(record_bytes(&data, number), number, 512).unwrap();
    assert!(record.is_directory);
}

#[rstest]
fn resident_data_has_size_but_no_runs(mut image: NtfsImageBuilder) {
    let number = image.add_deleted_resident_file("note.txt", b"hello");
    let data = image.build();

    let record = MftRecord::parse(record_bytes(&data, number), number, 512).unwrap();
    assert!(record.resident);
    assert_eq!(record.size, 5);
    assert!(record.runs.is_empty());
}

#[rstest]
fn multi_run_file_decodes_to_absolute_extents(mut image: NtfsImageBuilder) {
    let number = image.add_deleted_file_with_runs(
        "frag.bin",
        3 * CLUSTER_SIZE as u64,
        &[(Some(100), 1), (Some(300), 1), (None, 1)],
    );
    let data = image.build();

    let record = MftRecord::parse(record_bytes(&data, number), number, 512).unwrap();
    assert_eq!(
        record.runs,
        vec![
            RunListEntry { lcn: Some(100), clusters: 1 },
            RunListEntry { lcn: Some(300), clusters: 1 },
            RunListEntry { lcn: None, clusters: 1 },
        ]
    );
}

#[rstest]
fn torn_record_is_rejected(mut image: NtfsImageBuilder) {
    let content = common::jpeg_payload(4096);
    let number = image.add_deleted_file("torn.jpg", &content, 100);
    image.tear_record(number);
    let data = image.build();

    assert!(MftRecord::parse(record_bytes(&data, number), number, 512).is_none());
}

#[rstest]
fn garbage_record_is_rejected(mut image: NtfsImageBuilder) {
    let number = image.add_raw_record(&[0xDE; 1024]);
    let data = image.build();

    assert!(MftRecord::parse(record_bytes(&data, number), number, 512).is_none());
}

#[test]
fn record_shorter_than_header_is_rejected() {
    assert!(MftRecord::parse(b"FILE", 0, 512).is_none());
    assert!(MftRecord::parse(&[], 0, 512).is_none());
}
