//! Volume snapshot enumeration (VSS)
//!
//! Point-in-time snapshots are a parallel, non-destructive recovery
//! path: a file deleted since the snapshot was taken still exists
//! inside it and can simply be copied out. Enumeration shells out to
//! `vssadmin`; the output parser is a pure function driven by fixture
//! text in tests.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory recursion ceiling when browsing a snapshot
const BROWSE_MAX_DEPTH: usize = 10;

/// One point-in-time snapshot of a volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Shadow copy id (GUID)
    pub id: String,
    /// Original volume path as printed by vssadmin
    pub volume_path: String,
    /// Volume the snapshot was taken of, e.g. "C:"
    pub original_volume: String,
    /// Creation time, RFC 3339 when parseable
    pub created: String,
    /// Device object path used to read the snapshot's contents
    pub device_object: String,
}

/// Result of snapshot enumeration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotListing {
    pub success: bool,
    pub snapshots: Vec<Snapshot>,
    pub error: Option<String>,
}

/// One file visible inside a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub modified: String,
    pub snapshot_id: String,
}

/// Availability probe for the snapshot service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAvailability {
    pub available: bool,
    pub message: String,
}

/// Checks whether the snapshot service can be queried at all
pub fn check_availability() -> SnapshotAvailability {
    if !cfg!(windows) {
        return SnapshotAvailability {
            available: false,
            message: "volume snapshots are a Windows-only feature".to_string(),
        };
    }

    match std::process::Command::new("vssadmin")
        .args(["list", "shadows"])
        .output()
    {
        Ok(output) => SnapshotAvailability {
            available: output.status.success(),
            message: if output.status.success() {
                "snapshot service is available".to_string()
            } else {
                "vssadmin is present but not usable; elevation may be required".to_string()
            },
        },
        Err(e) => SnapshotAvailability {
            available: false,
            message: format!("vssadmin could not be executed: {e}"),
        },
    }
}

/// Lists snapshots of one volume
pub fn list(drive: &str) -> SnapshotListing {
    let for_param = format!("/for={}\\", drive.trim_end_matches('\\'));
    let output = match std::process::Command::new("vssadmin")
        .args(["list", "shadows", &for_param])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            return SnapshotListing {
                success: false,
                snapshots: Vec::new(),
                error: Some(format!("vssadmin could not be executed: {e}")),
            }
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return SnapshotListing {
            success: false,
            snapshots: Vec::new(),
            error: Some(format!("vssadmin failed: {detail}")),
        };
    }

    if stdout.contains("No items found") || stdout.contains("No shadow copies") {
        debug!(%drive, "no snapshots present");
        return SnapshotListing {
            success: true,
            snapshots: Vec::new(),
            error: None,
        };
    }

    SnapshotListing {
        success: true,
        snapshots: parse_vssadmin_output(&stdout, drive),
        error: None,
    }
}

/// Parses `vssadmin list shadows` output
///
/// The format interleaves a "contained ... at creation time:" line
/// ahead of each "Shadow Copy ID:" block; both creation-time spellings
/// are accepted.
pub fn parse_vssadmin_output(output: &str, drive: &str) -> Vec<Snapshot> {
    let mut snapshots = Vec::new();
    let mut current: Option<Snapshot> = None;
    let mut pending_created: Option<String> = None;

    for line in output.lines() {
        let line = line.trim();

        if line.contains("at creation time:") {
            if let Some(date) = line.split("at creation time:").nth(1) {
                pending_created = Some(date.trim().to_string());
            }
        } else if let Some(id) = line.strip_prefix("Shadow Copy ID:") {
            if let Some(done) = current.take() {
                snapshots.push(done);
            }
            current = Some(Snapshot {
                id: id.trim().to_string(),
                volume_path: String::new(),
                original_volume: drive.to_string(),
                created: pending_created
                    .take()
                    .map(|d| normalize_date(&d))
                    .unwrap_or_default(),
                device_object: String::new(),
            });
        } else if let Some(volume) = line.strip_prefix("Original Volume:") {
            if let Some(ref mut snap) = current {
                snap.volume_path = volume.trim().to_string();
            }
        } else if let Some(date) = line.strip_prefix("Creation Time:") {
            if let Some(ref mut snap) = current {
                snap.created = normalize_date(date.trim());
            }
        } else if let Some(device) = line.strip_prefix("Shadow Copy Volume:") {
            if let Some(ref mut snap) = current {
                snap.device_object = device.trim().to_string();
            }
        }
    }

    if let Some(done) = current {
        snapshots.push(done);
    }

    snapshots
}

/// Normalizes the assorted vssadmin date spellings to RFC 3339;
/// unparseable input passes through unchanged
fn normalize_date(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    const FORMATS: [&str; 7] = [
        "%d-%m-%Y %H:%M:%S",
        "%m-%d-%Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y %I:%M:%S %p",
        "%d/%m/%Y %I:%M:%S %p",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];

    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return parsed.and_utc().to_rfc3339();
        }
    }

    warn!(%raw, "unparseable snapshot creation time, passing through");
    raw.to_string()
}

/// Lists files visible inside a snapshot, optionally under a subpath
pub fn browse(snapshot: &Snapshot, subpath: Option<&str>) -> Result<Vec<SnapshotFile>, String> {
    if snapshot.device_object.is_empty() {
        return Err("snapshot has no device object path".to_string());
    }

    let mut base = snapshot.device_object.clone();
    if !base.ends_with('\\') {
        base.push('\\');
    }
    if let Some(sub) = subpath {
        base.push_str(sub.trim_start_matches(['\\', '/']));
    }

    let mut files = Vec::new();
    walk(Path::new(&base), 0, &mut |entry_path, meta| {
        let modified = meta
            .modified()
            .ok()
            .map(|time| chrono::DateTime::<chrono::Utc>::from(time).to_rfc3339())
            .unwrap_or_default();
        files.push(SnapshotFile {
            path: entry_path.display().to_string(),
            name: entry_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: meta.len(),
            modified,
            snapshot_id: snapshot.id.clone(),
        });
    });

    Ok(files)
}

/// Bounded recursive walk; unreadable directories are skipped
fn walk(dir: &Path, depth: usize, visit: &mut dyn FnMut(PathBuf, std::fs::Metadata)) {
    if depth > BROWSE_MAX_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_dir() {
            walk(&path, depth + 1, visit);
        } else if meta.is_file() {
            visit(path, meta);
        }
    }
}

/// Copies one file out of a snapshot to a destination path
pub fn recover(snapshot: &Snapshot, source: &str, destination: &str) -> Result<u64, String> {
    if snapshot.device_object.is_empty() {
        return Err("snapshot has no device object path".to_string());
    }

    if let Some(parent) = Path::new(destination).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create destination directory: {e}"))?;
    }

    std::fs::copy(source, destination).map_err(|e| format!("snapshot copy failed: {e}"))
}
