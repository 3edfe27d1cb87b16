//! CLI dispatch
//!
//! Maps each command to its use case and enforces the transport
//! contract: exactly one JSON object on stdout, progress and
//! diagnostics on stderr, non-zero exit when the payload reports
//! failure. Stdout stays the single source of truth for the caller.

mod commands;
mod progress;

pub use commands::{Cli, Command};
pub use progress::{emit_progress, emit_result};

use crate::application::dto::{ScanMode, ScanOptions};
use crate::application::{select_engine, RecoverFilesUseCase, ScanVolumeUseCase};
use crate::domain::cancel::CancelToken;
use crate::domain::entities::{RecoverableFile, RecoveryStatus, VolumeSpec};
use crate::domain::services::SignatureRegistry;
use crate::infrastructure::persistence::LocalFileSink;
use crate::infrastructure::{encryption, snapshots, volumes};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::error;

/// Runs one command and returns the process exit code
pub fn run(cli: Cli) -> i32 {
    match cli.command {
        Command::ListVolumes => {
            emit_result(&volumes::list_volumes());
            0
        }

        Command::CheckPrivilege => {
            emit_result(&volumes::check_privilege());
            0
        }

        Command::Scan {
            volume,
            mode,
            max_records,
            max_sectors,
            max_carve_seconds,
            max_carved_files,
        } => run_scan(
            &volume,
            &mode,
            max_records,
            max_sectors,
            max_carve_seconds,
            max_carved_files,
        ),

        Command::RecoverOne {
            volume,
            file_json,
            dest_path,
        } => run_recover_one(&volume, &file_json, &dest_path),

        Command::RecoverBatch {
            volume,
            files_json,
            dest_path,
            parallelism,
        } => run_recover_batch(&volume, &files_json, &dest_path, parallelism),

        Command::EncryptionStatus { volume } => {
            emit_result(&encryption::status(&VolumeSpec::parse(&volume)));
            0
        }

        Command::EncryptionUnlockPassword { volume, secret } => {
            let outcome =
                encryption::unlock_with_password(&VolumeSpec::parse(&volume), &secret);
            let code = i32::from(!outcome.success);
            emit_result(&outcome);
            code
        }

        Command::EncryptionUnlockKey { volume, key } => {
            let outcome =
                encryption::unlock_with_recovery_key(&VolumeSpec::parse(&volume), &key);
            let code = i32::from(!outcome.success);
            emit_result(&outcome);
            code
        }

        Command::EncryptionLock { volume } => {
            let outcome = encryption::lock(&VolumeSpec::parse(&volume));
            let code = i32::from(!outcome.success);
            emit_result(&outcome);
            code
        }

        Command::ListSignatures => {
            let registry = SignatureRegistry::new();
            emit_result(&registry.summaries());
            0
        }

        Command::SnapshotCheck => {
            emit_result(&snapshots::check_availability());
            0
        }

        Command::SnapshotList { volume } => {
            let Some(drive) = VolumeSpec::parse(&volume).drive() else {
                emit_result(&json!({
                    "success": false,
                    "snapshots": [],
                    "error": "snapshots exist only for live volumes",
                }));
                return 1;
            };
            let listing = snapshots::list(&drive);
            let code = i32::from(!listing.success);
            emit_result(&listing);
            code
        }

        Command::SnapshotBrowse {
            snapshot_json,
            path,
        } => {
            let snapshot: snapshots::Snapshot = match serde_json::from_str(&snapshot_json) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    emit_result(&json!({
                        "success": false,
                        "files": [],
                        "error": format!("invalid snapshot JSON: {err}"),
                    }));
                    return 1;
                }
            };
            match snapshots::browse(&snapshot, path.as_deref()) {
                Ok(files) => {
                    emit_result(&json!({ "success": true, "files": files }));
                    0
                }
                Err(err) => {
                    emit_result(&json!({ "success": false, "files": [], "error": err }));
                    1
                }
            }
        }

        Command::SnapshotRecover {
            snapshot_json,
            source,
            dest,
        } => {
            let snapshot: snapshots::Snapshot = match serde_json::from_str(&snapshot_json) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    emit_result(&json!({
                        "success": false,
                        "message": format!("invalid snapshot JSON: {err}"),
                        "bytes_recovered": 0,
                    }));
                    return 1;
                }
            };
            match snapshots::recover(&snapshot, &source, &dest) {
                Ok(bytes) => {
                    emit_result(&json!({
                        "success": true,
                        "message": format!("recovered {bytes} bytes from snapshot"),
                        "bytes_recovered": bytes,
                    }));
                    0
                }
                Err(err) => {
                    emit_result(&json!({
                        "success": false,
                        "message": err,
                        "bytes_recovered": 0,
                    }));
                    1
                }
            }
        }
    }
}

fn run_scan(
    volume: &str,
    mode: &str,
    max_records: Option<usize>,
    max_sectors: Option<u64>,
    max_carve_seconds: Option<u64>,
    max_carved_files: Option<usize>,
) -> i32 {
    let mode: ScanMode = match mode.parse() {
        Ok(mode) => mode,
        Err(err) => {
            emit_result(&json!({ "success": false, "message": err }));
            return 1;
        }
    };

    let mut options = ScanOptions::new(mode);
    if let Some(n) = max_records {
        options = options.with_max_records(n);
    }
    if let Some(n) = max_sectors {
        options = options.with_max_carve_sectors(n);
    }
    if let Some(n) = max_carve_seconds {
        options = options.with_max_carve_duration(Duration::from_secs(n));
    }
    if let Some(n) = max_carved_files {
        options = options.with_max_carved_files(n);
    }

    let spec = VolumeSpec::parse(volume);
    let registry = SignatureRegistry::new();
    let cancel = CancelToken::new();

    let mut sink = |event: &crate::domain::entities::ProgressEvent| emit_progress(event);
    let report = ScanVolumeUseCase::new(&registry).execute(&spec, &options, &cancel, &mut sink);

    let code = i32::from(!report.success);
    emit_result(&report);
    code
}

fn run_recover_one(volume: &str, file_json: &str, dest_path: &Path) -> i32 {
    let file: RecoverableFile = match serde_json::from_str(file_json) {
        Ok(file) => file,
        Err(err) => {
            emit_result(&json!({
                "success": false,
                "message": format!("invalid candidate JSON: {err}"),
                "bytes_recovered": 0,
            }));
            return 1;
        }
    };

    let outcome = with_recovery_setup(volume, dest_path, |use_case| {
        use_case.execute_one(&file, &CancelToken::new())
    });

    match outcome {
        Ok(outcome) => {
            let success = outcome.status != RecoveryStatus::Failed;
            emit_result(&json!({
                "success": success,
                "message": recovery_message(&outcome),
                "bytes_recovered": outcome.bytes_written,
                "status": outcome.status,
                "destination": outcome.destination,
                "failure": outcome.failure,
            }));
            i32::from(!success)
        }
        Err(message) => {
            emit_result(&json!({
                "success": false,
                "message": message,
                "bytes_recovered": 0,
            }));
            1
        }
    }
}

fn run_recover_batch(volume: &str, files_json: &str, dest_path: &Path, parallelism: usize) -> i32 {
    let files: Vec<RecoverableFile> = match serde_json::from_str(files_json) {
        Ok(files) => files,
        Err(err) => {
            emit_result(&json!({
                "success": false,
                "message": format!("invalid candidate list JSON: {err}"),
            }));
            return 1;
        }
    };

    let report = with_recovery_setup(volume, dest_path, |use_case| {
        let (tx, rx) = crossbeam_channel::unbounded();
        let forwarder = std::thread::spawn(move || {
            for event in rx {
                emit_progress(&event);
            }
        });

        let report = use_case.execute_batch(&files, parallelism, &CancelToken::new(), Some(&tx));
        drop(tx);
        let _ = forwarder.join();
        report
    });

    match report {
        Ok(report) => {
            let code = i32::from(report.failed > 0 && report.recovered == 0);
            emit_result(&report);
            code
        }
        Err(message) => {
            emit_result(&json!({ "success": false, "message": message }));
            1
        }
    }
}

/// Opens the engine and sink shared by both recovery commands
fn with_recovery_setup<T>(
    volume: &str,
    dest_path: &Path,
    body: impl FnOnce(&RecoverFilesUseCase<'_>) -> T,
) -> Result<T, String> {
    let spec = VolumeSpec::parse(volume);
    let gate = encryption::status(&spec);

    let (engine, _) = select_engine(&spec, gate.state).map_err(|err| {
        error!(%err, "engine selection failed");
        format!("cannot open volume: {err}")
    })?;

    let sink = LocalFileSink::new(dest_path)
        .map_err(|err| format!("destination unavailable: {err}"))?;

    let registry = SignatureRegistry::new();
    let use_case = RecoverFilesUseCase::new(engine.as_ref(), &registry, &sink);
    Ok(body(&use_case))
}

fn recovery_message(outcome: &crate::domain::entities::RecoveryOutcome) -> String {
    match outcome.status {
        RecoveryStatus::Recovered => {
            format!("recovered {} bytes", outcome.bytes_written)
        }
        RecoveryStatus::RecoveredWithCorruptionRisk => format!(
            "recovered {} bytes, but the content header no longer matches the expected type",
            outcome.bytes_written
        ),
        RecoveryStatus::Failed => match &outcome.failure {
            Some(failure) => format!("recovery failed: {failure:?}"),
            None => "recovery failed".to_string(),
        },
    }
}
