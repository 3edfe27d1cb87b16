//! Scan use case
//!
//! The engine entry point: selects the volume access engine from the
//! encryption gate's verdict, drives the metadata, journal, and
//! carving stages in order, deduplicates by record id, annotates
//! every candidate with a confidence score, and streams progress
//! events. Failures never escape as errors; they become structured
//! failure reports.

use crate::application::dto::{ScanMode, ScanOptions};
use crate::application::select_engine;
use crate::domain::cancel::CancelToken;
use crate::domain::entities::{
    category_for_extension, estimate_age, type_name_for_extension, CarveSkipReason,
    EncryptionState, ProgressEvent, RecoverableFile, RecoverySource, ScanReport, ScanStage,
    VolumeSpec,
};
use crate::domain::repositories::{VolumeAccess, VolumeAccessError};
use crate::domain::services::{ConfidenceScorer, SignatureRegistry};
use crate::infrastructure::carvers::{CarveLimits, SectorCarver};
use crate::infrastructure::encryption;
use crate::infrastructure::file_systems::ntfs::MftRecord;
use crate::infrastructure::volumes;
use chrono::DateTime;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Records fetched per metadata_records call
const RECORD_BATCH: usize = 2048;

/// Metadata progress cadence, in records
const METADATA_PROGRESS_EVERY: u64 = 10_000;

/// Callback receiving progress events during a scan
pub type ProgressSink<'a> = &'a mut dyn FnMut(&ProgressEvent);

/// One scan invocation
pub struct ScanVolumeUseCase<'a> {
    registry: &'a SignatureRegistry,
}

impl<'a> ScanVolumeUseCase<'a> {
    pub fn new(registry: &'a SignatureRegistry) -> Self {
        Self { registry }
    }

    /// Runs the scan and always returns a report
    pub fn execute(
        &self,
        spec: &VolumeSpec,
        options: &ScanOptions,
        cancel: &CancelToken,
        progress: ProgressSink<'_>,
    ) -> ScanReport {
        let started = Instant::now();
        let gate = encryption::status(spec);
        let mode = options.mode.as_str();

        if spec.is_live_volume() && !volumes::is_elevated() {
            let mut report = ScanReport::failure(
                spec.to_string(),
                mode,
                gate.state,
                "administrator privileges are required for volume scanning".to_string(),
            );
            report.requires_admin = true;
            return report;
        }

        if !spec.image_exists() {
            return ScanReport::failure(
                spec.to_string(),
                mode,
                gate.state,
                format!("volume image {spec} does not exist"),
            );
        }

        if gate.state == EncryptionState::Locked {
            return ScanReport::failure(
                spec.to_string(),
                mode,
                gate.state,
                "volume is encrypted and locked; unlock it with a password or recovery key first"
                    .to_string(),
            );
        }

        // Engine selection is deterministic from the gate verdict; a
        // blocked raw open degrades to the mediated path explicitly
        let (volume, fallback_reason) = match select_engine(spec, gate.state) {
            Ok(selected) => selected,
            Err(err) => {
                let mut report = ScanReport::failure(
                    spec.to_string(),
                    mode,
                    gate.state,
                    format!("cannot open volume: {err}"),
                );
                if matches!(err, VolumeAccessError::AccessBlocked(_)) {
                    report.requires_admin = true;
                }
                return report;
            }
        };

        let mut report = self.execute_with_volume(
            &spec.to_string(),
            gate.state,
            volume.as_ref(),
            options,
            cancel,
            progress,
            fallback_reason,
        );
        report.scan_duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    /// Runs the scan stages against an already-opened engine
    ///
    /// This is the stateless core: a pure function of (volume
    /// snapshot, mode, limits), with engine selection factored out.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_with_volume(
        &self,
        label: &str,
        encryption: EncryptionState,
        volume: &dyn VolumeAccess,
        options: &ScanOptions,
        cancel: &CancelToken,
        progress: ProgressSink<'_>,
        fallback_reason: Option<CarveSkipReason>,
    ) -> ScanReport {
        let started = Instant::now();
        let mode = options.mode.as_str();
        let mut report = ScanReport::started(label.to_string(), mode, encryption);
        report.engine = Some(volume.engine());

        let outcome = self.run_stages(
            label,
            volume,
            options,
            cancel,
            progress,
            &mut report,
            fallback_reason,
        );

        report.scan_duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            StageOutcome::Completed => {
                report.finalize();
                report.message = format!(
                    "{} scan complete: {} index entries, {} journal-only entries, {} carved",
                    mode,
                    report.metadata_entries.len(),
                    report.journal_entries.len(),
                    report.carved_entries.len(),
                );
            }
            StageOutcome::Cancelled => {
                report.finalize();
                report.success = false;
                report.cancelled = true;
                report.message = format!("{mode} scan cancelled");
            }
            StageOutcome::Failed(message) => {
                report.finalize();
                report.success = false;
                report.message = message;
            }
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    fn run_stages(
        &self,
        label: &str,
        volume: &dyn VolumeAccess,
        options: &ScanOptions,
        cancel: &CancelToken,
        progress: ProgressSink<'_>,
        report: &mut ScanReport,
        fallback_reason: Option<CarveSkipReason>,
    ) -> StageOutcome {
        // Stage 1: metadata index
        let mut surfaced: HashSet<u64> = HashSet::new();
        let mut in_use_names: HashMap<u64, String> = HashMap::new();

        match self.scan_metadata(
            label,
            volume,
            options,
            cancel,
            progress,
            report,
            &mut surfaced,
            &mut in_use_names,
        ) {
            Ok(()) => {}
            Err(StageError::Cancelled) => return StageOutcome::Cancelled,
            Err(StageError::Fatal(message)) => return StageOutcome::Failed(message),
        }

        // Stage 2: change journal; failures here are non-fatal, the
        // journal is a supplemental source
        self.scan_journal(label, volume, cancel, progress, report, &surfaced, &in_use_names);
        if cancel.is_cancelled() {
            return StageOutcome::Cancelled;
        }

        // Stage 3: carving, deep mode on the raw path only
        if options.mode == ScanMode::Deep {
            if volume.supports_carving() {
                match self.scan_carve(label, volume, &options.limits.carve, cancel, progress, report)
                {
                    Ok(()) => {}
                    Err(StageError::Cancelled) => return StageOutcome::Cancelled,
                    Err(StageError::Fatal(message)) => return StageOutcome::Failed(message),
                }
            } else {
                report.carving_skipped = true;
                report.carving_skipped_reason =
                    fallback_reason.or(Some(CarveSkipReason::EncryptedVolume));
                info!(
                    reason = ?report.carving_skipped_reason,
                    "carving skipped on this engine"
                );
            }
        }

        // Scoring pass: cluster-content checks for metadata entries,
        // fixed baselines for the rest
        let scorer = ConfidenceScorer::new(self.registry);
        for entry in report
            .metadata_entries
            .iter_mut()
            .chain(report.journal_entries.iter_mut())
            .chain(report.carved_entries.iter_mut())
        {
            if cancel.is_cancelled() {
                return StageOutcome::Cancelled;
            }
            scorer.score(entry, volume);
        }

        StageOutcome::Completed
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_metadata(
        &self,
        label: &str,
        volume: &dyn VolumeAccess,
        options: &ScanOptions,
        cancel: &CancelToken,
        progress: ProgressSink<'_>,
        report: &mut ScanReport,
        surfaced: &mut HashSet<u64>,
        in_use_names: &mut HashMap<u64, String>,
    ) -> Result<(), StageError> {
        let max_records = options.limits.max_metadata_records as u64;
        let bytes_per_sector = volume.geometry().bytes_per_sector as usize;
        let now_unix = chrono::Utc::now().timestamp();

        progress(&ProgressEvent {
            stage: ScanStage::Metadata,
            percent: Some(0.0),
            records_seen: 0,
            files_found: 0,
        });

        let mut next_record = 0u64;
        let mut last_event_at = 0u64;

        'outer: while next_record < max_records {
            let batch_len = RECORD_BATCH.min((max_records - next_record) as usize);
            let batch = match volume.metadata_records(next_record, batch_len) {
                Ok(batch) => batch,
                Err(err) => {
                    return Err(StageError::Fatal(format!(
                        "metadata index read failed at record {next_record}: {err}"
                    )))
                }
            };
            if batch.is_empty() {
                break;
            }

            for raw in &batch {
                if cancel.is_cancelled() {
                    return Err(StageError::Cancelled);
                }

                report.mft_records_scanned += 1;
                next_record = raw.number + 1;

                let Some(record) = MftRecord::parse(&raw.bytes, raw.number, bytes_per_sector)
                else {
                    // Unallocated regions parse to nothing; only count
                    // records that claimed to be FILE records
                    if raw.bytes.starts_with(b"FILE") {
                        report.records_skipped += 1;
                    }
                    continue;
                };

                if record.is_in_use {
                    in_use_names.insert(record.number, record.name.clone());
                }

                if !record.is_deleted()
                    || record.is_directory
                    || record.is_system()
                    || record.name.is_empty()
                {
                    continue;
                }

                surfaced.insert(record.number);
                report
                    .metadata_entries
                    .push(candidate_from_record(label, &record, now_unix));

                if report.mft_records_scanned - last_event_at >= METADATA_PROGRESS_EVERY {
                    last_event_at = report.mft_records_scanned;
                    progress(&ProgressEvent {
                        stage: ScanStage::Metadata,
                        percent: Some(
                            (report.mft_records_scanned as f32 / max_records as f32) * 100.0,
                        ),
                        records_seen: report.mft_records_scanned,
                        files_found: report.metadata_entries.len(),
                    });
                }
            }

            if (batch.len() as u64) < batch_len as u64 {
                break 'outer;
            }
        }

        progress(&ProgressEvent {
            stage: ScanStage::Metadata,
            percent: Some(100.0),
            records_seen: report.mft_records_scanned,
            files_found: report.metadata_entries.len(),
        });
        debug!(
            records = report.mft_records_scanned,
            skipped = report.records_skipped,
            deleted = report.metadata_entries.len(),
            "metadata stage complete"
        );
        Ok(())
    }

    /// Journal stage; entries already surfaced by the metadata stage
    /// are dropped (metadata-index precedence)
    #[allow(clippy::too_many_arguments)]
    fn scan_journal(
        &self,
        label: &str,
        volume: &dyn VolumeAccess,
        cancel: &CancelToken,
        progress: ProgressSink<'_>,
        report: &mut ScanReport,
        surfaced: &HashSet<u64>,
        in_use_names: &HashMap<u64, String>,
    ) {
        progress(&ProgressEvent {
            stage: ScanStage::Journal,
            percent: None,
            records_seen: 0,
            files_found: report.metadata_entries.len(),
        });

        let events = match volume.journal_events() {
            Ok(events) => events,
            Err(err) => {
                warn!(%err, "journal scan failed, continuing without it");
                Vec::new()
            }
        };

        let now_unix = chrono::Utc::now().timestamp();
        let bytes_per_sector = volume.geometry().bytes_per_sector as usize;
        let mut seen_here: HashSet<u64> = HashSet::new();
        let mut events_seen = 0u64;

        for event in events {
            if cancel.is_cancelled() {
                return;
            }
            events_seen += 1;

            if !event.is_delete() || event.is_directory() {
                continue;
            }
            if surfaced.contains(&event.record) || !seen_here.insert(event.record) {
                continue;
            }

            // The slot may still hold the old record, hold a new file
            // entirely, or be unreadable. Only a record that still
            // carries this name contributes trustworthy runs.
            let mut runs = Vec::new();
            let mut size = 0u64;
            let recycled = in_use_names.contains_key(&event.record);
            if !recycled {
                if let Ok(records) = volume.metadata_records(event.record, 1) {
                    if let Some(raw) = records.first() {
                        if let Some(record) =
                            MftRecord::parse(&raw.bytes, raw.number, bytes_per_sector)
                        {
                            if record.name.eq_ignore_ascii_case(&event.file_name)
                                && record.is_deleted()
                            {
                                runs = record
                                    .runs
                                    .iter()
                                    .map(|r| crate::domain::entities::ClusterRun {
                                        lcn: r.lcn,
                                        clusters: r.clusters,
                                    })
                                    .collect();
                                size = record.size;
                            }
                        }
                    }
                }
            }

            let extension = event
                .file_name
                .rsplit('.')
                .next()
                .filter(|ext| ext.len() <= 10 && *ext != event.file_name)
                .unwrap_or("")
                .to_ascii_lowercase();

            report.journal_entries.push(RecoverableFile {
                id: format!("usn-{}", event.record),
                name: event.file_name.clone(),
                path: format!("{}/[journal]/{}", label, event.file_name),
                size,
                category: category_for_extension(&extension).to_string(),
                type_name: type_name_for_extension(&extension),
                extension,
                source: RecoverySource::Journal,
                is_deleted: true,
                created: None,
                modified: format_timestamp(event.timestamp),
                age_estimate: Some(estimate_age(event.timestamp, now_unix)),
                cluster_runs: runs,
                carve_region: None,
                fragment: false,
                likely_overwritten: false,
                confidence: 0,
            });
        }

        progress(&ProgressEvent {
            stage: ScanStage::Journal,
            percent: None,
            records_seen: events_seen,
            files_found: report.metadata_entries.len() + report.journal_entries.len(),
        });
        debug!(
            events = events_seen,
            kept = report.journal_entries.len(),
            "journal stage complete"
        );
    }

    fn scan_carve(
        &self,
        label: &str,
        volume: &dyn VolumeAccess,
        limits: &CarveLimits,
        cancel: &CancelToken,
        progress: ProgressSink<'_>,
        report: &mut ScanReport,
    ) -> Result<(), StageError> {
        let base_found = report.metadata_entries.len() + report.journal_entries.len();
        progress(&ProgressEvent {
            stage: ScanStage::Carving,
            percent: Some(0.0),
            records_seen: 0,
            files_found: base_found,
        });

        let sector_goal = limits
            .max_sectors
            .min(volume.geometry().total_sectors())
            .max(1);

        let carver = SectorCarver::new(self.registry);
        let mut forward = |sectors: u64, hits: usize| {
            progress(&ProgressEvent {
                stage: ScanStage::Carving,
                percent: Some(((sectors as f32 / sector_goal as f32) * 100.0).min(100.0)),
                records_seen: sectors,
                files_found: base_found + hits,
            });
        };

        let outcome = carver
            .carve(volume, limits, cancel, &mut forward)
            .map_err(|err| StageError::Fatal(format!("carving pass failed: {err}")))?;

        report.sectors_scanned = outcome.sectors_scanned;
        report.carve_stop = Some(outcome.stop);

        for (index, hit) in outcome.hits.iter().enumerate() {
            let n = index + 1;
            report.carved_entries.push(RecoverableFile {
                id: format!("carve-{n}"),
                name: format!("carved_{n}.{}", hit.signature.extension),
                path: format!("{}/[carved]/offset_{}", label, hit.offset),
                size: hit.length,
                extension: hit.signature.extension.to_string(),
                category: hit.signature.category.to_string(),
                type_name: hit.signature.name.to_string(),
                source: RecoverySource::Carved,
                is_deleted: true,
                created: None,
                modified: None,
                age_estimate: None,
                cluster_runs: Vec::new(),
                carve_region: Some(crate::domain::entities::CarveRegion {
                    offset: hit.offset,
                    length: hit.length,
                }),
                fragment: !hit.footer_confirmed,
                likely_overwritten: false,
                confidence: 0,
            });
        }

        if outcome.stop == crate::domain::entities::CarveStop::Cancelled {
            return Err(StageError::Cancelled);
        }
        Ok(())
    }
}

enum StageOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

enum StageError {
    Cancelled,
    Fatal(String),
}

/// Builds a metadata-index candidate from a decoded record
fn candidate_from_record(
    label: &str,
    record: &MftRecord,
    now_unix: i64,
) -> RecoverableFile {
    let extension = record.extension();
    RecoverableFile {
        id: format!("mft-{}", record.number),
        name: record.name.clone(),
        path: format!("{}/[deleted]/{}", label, record.name),
        size: record.size,
        category: category_for_extension(&extension).to_string(),
        type_name: type_name_for_extension(&extension),
        extension,
        source: RecoverySource::MetadataIndex,
        is_deleted: true,
        created: format_timestamp(record.created),
        modified: format_timestamp(record.modified),
        age_estimate: Some(estimate_age(record.modified, now_unix)),
        cluster_runs: record
            .runs
            .iter()
            .map(|r| crate::domain::entities::ClusterRun {
                lcn: r.lcn,
                clusters: r.clusters,
            })
            .collect(),
        carve_region: None,
        fragment: false,
        likely_overwritten: false,
        confidence: 0,
    }
}

fn format_timestamp(unix: i64) -> Option<String> {
    if unix <= 0 {
        return None;
    }
    DateTime::from_timestamp(unix, 0).map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
