//! Scan orchestration tests
//!
//! Drives the scan use case over synthetic images and fake volumes:
//! mode behavior, deduplication, carving-skip flagging, scoring, and
//! cancellation.

mod common;

use common::{delete_event, jpeg_payload, FakeVolume, NtfsImageBuilder, CLUSTER_SIZE};
use salvage::application::dto::{ScanMode, ScanOptions};
use salvage::application::ScanVolumeUseCase;
use salvage::domain::cancel::CancelToken;
use salvage::domain::entities::{
    CarveSkipReason, EncryptionState, ProgressEvent, RecoverySource, ScanReport, ScanStage,
};
use salvage::domain::services::SignatureRegistry;
use std::collections::HashSet;

const IMAGE_SIZE: usize = 10 * 1024 * 1024;

fn scan(volume: &FakeVolume, mode: ScanMode) -> (ScanReport, Vec<ProgressEvent>) {
    scan_with_cancel(volume, mode, &CancelToken::new())
}

fn scan_with_cancel(
    volume: &FakeVolume,
    mode: ScanMode,
    cancel: &CancelToken,
) -> (ScanReport, Vec<ProgressEvent>) {
    let registry = SignatureRegistry::new();
    let use_case = ScanVolumeUseCase::new(&registry);
    let mut events = Vec::new();
    let mut sink = |event: &ProgressEvent| events.push(event.clone());
    let report = use_case.execute_with_volume(
        "test-volume",
        EncryptionState::NotEncrypted,
        volume,
        &ScanOptions::new(mode),
        cancel,
        &mut sink,
        None,
    );
    (report, events)
}

fn populated_image() -> NtfsImageBuilder {
    let mut image = NtfsImageBuilder::new(IMAGE_SIZE);
    image.add_deleted_file("photo.jpg", &jpeg_payload(4096), 100);
    image.add_deleted_file("report.pdf", b"%PDF-1.7 content %%EOF", 120);
    image.add_active_file("keep.txt", b"not deleted", 140);
    image.add_deleted_directory("oldstuff");
    image
}

#[test]
fn quick_scan_surfaces_deleted_files_only() {
    let volume = FakeVolume::from_image(populated_image().build());
    let (report, _) = scan(&volume, ScanMode::Quick);

    assert!(report.success);
    assert_eq!(report.metadata_entries.len(), 2);
    let names: HashSet<_> = report
        .metadata_entries
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert!(names.contains("photo.jpg"));
    assert!(names.contains("report.pdf"));

    // System records, directories, and in-use files stay out
    assert!(!names.contains("$MFT"));
    assert!(!names.contains("keep.txt"));
    assert!(!names.contains("oldstuff"));
}

#[test]
fn quick_scan_never_carves() {
    let mut image = populated_image();
    // An orphan payload with no index record, carvable in deep mode
    image.write_cluster(200, &jpeg_payload(4096));
    let volume = FakeVolume::from_image(image.build());

    let (report, _) = scan(&volume, ScanMode::Quick);
    assert!(report.carved_entries.is_empty());
    assert_eq!(report.sectors_scanned, 0);
    assert!(report.carve_stop.is_none());
    assert!(!report.carving_skipped);
}

#[test]
fn deep_scan_carves_orphan_content() {
    let mut image = populated_image();
    image.write_cluster(200, &jpeg_payload(4096));
    let volume = FakeVolume::from_image(image.build());

    let (report, _) = scan(&volume, ScanMode::Deep);

    assert!(report.success);
    assert!(report.sectors_scanned > 0);
    assert!(report.carve_stop.is_some());

    let orphan_offset = 200 * CLUSTER_SIZE as u64;
    let orphan: Vec<_> = report
        .carved_entries
        .iter()
        .filter(|e| e.carve_region.map(|r| r.offset) == Some(orphan_offset))
        .collect();
    assert_eq!(orphan.len(), 1);
    assert_eq!(orphan[0].source, RecoverySource::Carved);
    assert!(!orphan[0].fragment);
    assert_eq!(orphan[0].size, 4096);
}

#[test]
fn deep_scan_on_mediated_engine_flags_carving_skipped() {
    let volume = FakeVolume::mediated(populated_image().build());
    let (report, _) = scan(&volume, ScanMode::Deep);

    assert!(report.success);
    assert!(report.carving_skipped);
    assert_eq!(
        report.carving_skipped_reason,
        Some(CarveSkipReason::EncryptedVolume)
    );
    assert!(report.carved_entries.is_empty());
    assert_eq!(report.sectors_scanned, 0);
}

#[test]
fn totals_and_ids_hold_across_sources() {
    let mut image = populated_image();
    image.write_cluster(200, &jpeg_payload(4096));
    let mut volume = FakeVolume::from_image(image.build());
    volume.events = vec![
        delete_event("ghost.txt", 900),
        delete_event("ghost.txt", 900), // duplicate event
    ];

    let (report, _) = scan(&volume, ScanMode::Deep);

    assert_eq!(
        report.total_files,
        report.metadata_entries.len()
            + report.carved_entries.len()
            + report.journal_entries.len()
    );

    let mut ids = HashSet::new();
    for entry in report
        .metadata_entries
        .iter()
        .chain(report.carved_entries.iter())
        .chain(report.journal_entries.iter())
    {
        assert!(ids.insert(entry.id.clone()), "duplicate id {}", entry.id);
    }
}

#[test]
fn journal_entries_deduplicate_against_metadata() {
    let mut image = NtfsImageBuilder::new(IMAGE_SIZE);
    let surfaced = image.add_deleted_file("photo.jpg", &jpeg_payload(4096), 100);
    let mut volume = FakeVolume::from_image(image.build());
    volume.events = vec![
        delete_event("photo.jpg", surfaced), // already surfaced by the index
        delete_event("gone.docx", 901),      // journal-only
    ];

    let (report, _) = scan(&volume, ScanMode::Quick);

    assert_eq!(report.metadata_entries.len(), 1);
    assert_eq!(report.journal_entries.len(), 1);
    assert_eq!(report.journal_entries[0].id, "usn-901");
    assert_eq!(report.journal_entries[0].source, RecoverySource::Journal);
}

#[test]
fn journal_confidence_never_exceeds_baseline() {
    let mut image = NtfsImageBuilder::new(IMAGE_SIZE);
    // The journal-only file's old cluster still holds a pristine
    // signature, which must not lift the score
    image.write_cluster(300, &jpeg_payload(4096));
    let mut volume = FakeVolume::from_image(image.build());
    volume.events = vec![delete_event("old.jpg", 950)];

    let (report, _) = scan(&volume, ScanMode::Quick);

    assert_eq!(report.journal_entries.len(), 1);
    assert!(report.journal_entries[0].confidence <= 40);
}

#[test]
fn metadata_scoring_reads_current_cluster_content() {
    let mut image = NtfsImageBuilder::new(IMAGE_SIZE);
    image.add_deleted_file("intact.jpg", &jpeg_payload(4096), 100);

    // Deleted record whose cluster was since overwritten with
    // unrelated bytes
    let overwritten = vec![0x55u8; 4096];
    image.add_deleted_file("stomped.jpg", &overwritten, 130);

    let volume = FakeVolume::from_image(image.build());
    let (report, _) = scan(&volume, ScanMode::Quick);

    let by_name = |name: &str| {
        report
            .metadata_entries
            .iter()
            .find(|e| e.name == name)
            .unwrap()
    };

    let intact = by_name("intact.jpg");
    assert!(intact.confidence >= 80);
    assert!(!intact.likely_overwritten);

    let stomped = by_name("stomped.jpg");
    assert!(stomped.confidence < 50);
    assert!(stomped.likely_overwritten);
}

#[test]
fn cancellation_yields_cancelled_report() {
    let volume = FakeVolume::from_image(populated_image().build());
    let cancel = CancelToken::new();
    cancel.cancel();

    let (report, _) = scan_with_cancel(&volume, ScanMode::Deep, &cancel);
    assert!(!report.success);
    assert!(report.cancelled);
}

#[test]
fn progress_events_cover_stage_transitions() {
    let volume = FakeVolume::from_image(populated_image().build());
    let (_, events) = scan(&volume, ScanMode::Deep);

    let stages: HashSet<_> = events.iter().map(|e| e.stage).collect();
    assert!(stages.contains(&ScanStage::Metadata));
    assert!(stages.contains(&ScanStage::Journal));
    assert!(stages.contains(&ScanStage::Carving));

    // Carving emits periodic events with increasing sector counts
    let carve_counts: Vec<_> = events
        .iter()
        .filter(|e| e.stage == ScanStage::Carving)
        .map(|e| e.records_seen)
        .collect();
    assert!(carve_counts.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn torn_records_are_counted_and_skipped() {
    let mut image = NtfsImageBuilder::new(IMAGE_SIZE);
    image.add_deleted_file("good.jpg", &jpeg_payload(4096), 100);
    let torn = image.add_deleted_file("bad.jpg", &jpeg_payload(4096), 110);
    image.tear_record(torn);

    let volume = FakeVolume::from_image(image.build());
    let (report, _) = scan(&volume, ScanMode::Quick);

    assert!(report.success);
    assert_eq!(report.metadata_entries.len(), 1);
    assert_eq!(report.metadata_entries[0].name, "good.jpg");
    assert!(report.records_skipped >= 1);
}
