//! Encryption gate
//!
//! Detects full-volume (BitLocker) encryption and lock state through
//! `manage-bde`, and exposes unlock/lock operations. The verdict
//! drives engine selection: `Unlocked` volumes get the mediated
//! engine because their raw sectors hold ciphertext even while
//! mounted. Output parsing is kept in pure functions so captured
//! fixture text can drive the tests.

use crate::domain::entities::{EncryptionState, VolumeSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Full gate verdict for one volume, wire-facing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    pub volume: String,
    pub state: EncryptionState,
    pub protection: String,
    pub encryption_percentage: u8,
    pub encryption_method: String,
}

/// Result of an unlock or lock operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockOutcome {
    pub success: bool,
    pub message: String,
}

/// Queries the gate verdict for a volume
///
/// Image files are never encrypted from the engine's point of view;
/// live volumes are probed with `manage-bde -status`.
pub fn status(spec: &VolumeSpec) -> GateReport {
    let Some(drive) = spec.drive() else {
        return GateReport {
            volume: spec.to_string(),
            state: EncryptionState::NotEncrypted,
            protection: "not applicable".to_string(),
            encryption_percentage: 0,
            encryption_method: "none".to_string(),
        };
    };

    match run_manage_bde(&["-status", &drive]) {
        Some((stdout, stderr)) => parse_status_output(&drive, &stdout, &stderr),
        None => {
            debug!(%drive, "manage-bde unavailable, assuming unencrypted");
            GateReport {
                volume: drive,
                state: EncryptionState::NotEncrypted,
                protection: "unable to determine".to_string(),
                encryption_percentage: 0,
                encryption_method: "unknown".to_string(),
            }
        }
    }
}

/// Unlocks a volume with a password
pub fn unlock_with_password(spec: &VolumeSpec, password: &str) -> UnlockOutcome {
    unlock(spec, &["-password", password], "password")
}

/// Unlocks a volume with a numeric recovery key
pub fn unlock_with_recovery_key(spec: &VolumeSpec, key: &str) -> UnlockOutcome {
    unlock(spec, &["-recoverypassword", key], "recovery key")
}

/// Locks a volume; idempotent, locking a locked volume succeeds
pub fn lock(spec: &VolumeSpec) -> UnlockOutcome {
    let Some(drive) = spec.drive() else {
        return UnlockOutcome {
            success: false,
            message: "only live volumes can be locked".to_string(),
        };
    };

    match run_manage_bde(&["-lock", &drive, "-forcedismount"]) {
        Some((_, stderr)) if stderr.trim().is_empty() => UnlockOutcome {
            success: true,
            message: format!("volume {drive} locked"),
        },
        Some((stdout, stderr)) => {
            if stderr.to_lowercase().contains("already locked")
                || stdout.to_lowercase().contains("already locked")
            {
                UnlockOutcome {
                    success: true,
                    message: format!("volume {drive} was already locked"),
                }
            } else {
                UnlockOutcome {
                    success: false,
                    message: format!("lock failed: {}", stderr.trim()),
                }
            }
        }
        None => UnlockOutcome {
            success: false,
            message: "manage-bde is not available on this system".to_string(),
        },
    }
}

fn unlock(spec: &VolumeSpec, secret_args: &[&str], method: &str) -> UnlockOutcome {
    let Some(drive) = spec.drive() else {
        return UnlockOutcome {
            success: false,
            message: "only live volumes can be unlocked".to_string(),
        };
    };

    let mut args = vec!["-unlock", drive.as_str()];
    args.extend_from_slice(secret_args);

    match run_manage_bde(&args) {
        Some((stdout, stderr)) => {
            if stdout.contains("successfully unlocked") || stderr.trim().is_empty() {
                UnlockOutcome {
                    success: true,
                    message: format!("volume {drive} unlocked with {method}"),
                }
            } else {
                UnlockOutcome {
                    success: false,
                    message: format!("unlock failed: {}", stderr.trim()),
                }
            }
        }
        None => UnlockOutcome {
            success: false,
            message: "manage-bde is not available on this system".to_string(),
        },
    }
}

/// Runs manage-bde, returning (stdout, stderr); `None` when the tool
/// cannot be spawned at all
fn run_manage_bde(args: &[&str]) -> Option<(String, String)> {
    let output = std::process::Command::new("manage-bde")
        .args(args)
        .output()
        .ok()?;
    Some((
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}

/// Parses `manage-bde -status` output into a gate verdict
///
/// A volume is treated as unencrypted when any of: the BitLocker
/// version is "None", conversion reports "Fully Decrypted", or the
/// encrypted percentage parses to zero. The lock verdict comes from
/// the "Lock Status" line, with stderr as a fallback.
pub fn parse_status_output(drive: &str, stdout: &str, stderr: &str) -> GateReport {
    if stdout.trim().is_empty() {
        return GateReport {
            volume: drive.to_string(),
            state: EncryptionState::NotEncrypted,
            protection: "unable to determine".to_string(),
            encryption_percentage: 0,
            encryption_method: "unknown".to_string(),
        };
    }

    let percentage = extract_percentage(stdout);
    let version_none = stdout
        .lines()
        .any(|l| l.contains("BitLocker Version:") && l.trim_end().ends_with("None"));
    let fully_decrypted = stdout
        .lines()
        .any(|l| l.contains("Conversion Status:") && l.contains("Fully Decrypted"));
    let encrypted = !version_none && !fully_decrypted && percentage > 0;

    let locked = stdout
        .lines()
        .any(|l| l.contains("Lock Status:") && l.contains("Locked") && !l.contains("Unlocked"))
        || stderr.to_lowercase().contains("locked");

    let state = match (encrypted, locked) {
        (false, _) => EncryptionState::NotEncrypted,
        (true, true) => EncryptionState::Locked,
        (true, false) => EncryptionState::Unlocked,
    };

    let protection = if stdout.contains("Protection On") {
        "Protection On"
    } else if stdout.contains("Protection Off") {
        "Protection Off"
    } else {
        "Unknown"
    };

    GateReport {
        volume: drive.to_string(),
        state,
        protection: protection.to_string(),
        encryption_percentage: percentage,
        encryption_method: extract_method(stdout),
    }
}

fn extract_percentage(output: &str) -> u8 {
    output
        .lines()
        .find(|l| l.contains("Percentage Encrypted:"))
        .and_then(|l| l.split(':').nth(1))
        .and_then(|v| v.trim().trim_end_matches('%').trim().parse::<f32>().ok())
        .map(|v| v as u8)
        .unwrap_or(0)
}

fn extract_method(output: &str) -> String {
    output
        .lines()
        .find(|l| l.contains("Encryption Method:"))
        .and_then(|l| l.split(':').nth(1))
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNLOCKED_STATUS: &str = "\
Volume C: [System]
[OS Volume]

    Size:                 476.00 GB
    BitLocker Version:    2.0
    Conversion Status:    Fully Encrypted
    Percentage Encrypted: 100.0%
    Encryption Method:    XTS-AES 128
    Protection Status:    Protection On
    Lock Status:          Unlocked
";

    const LOCKED_STATUS: &str = "\
Volume D: [Data]
[Data Volume]

    Size:                 Unknown GB
    BitLocker Version:    2.0
    Conversion Status:    Unknown
    Percentage Encrypted: 100.0%
    Encryption Method:    XTS-AES 128
    Protection Status:    Unknown
    Lock Status:          Locked
";

    const PLAIN_STATUS: &str = "\
Volume E: [Backup]
[Data Volume]

    Size:                 931.00 GB
    BitLocker Version:    None
    Conversion Status:    Fully Decrypted
    Percentage Encrypted: 0.0%
    Encryption Method:    None
    Protection Status:    Protection Off
    Lock Status:          Unlocked
";

    #[test]
    fn unlocked_volume_is_distinct_from_unencrypted() {
        let report = parse_status_output("C:", UNLOCKED_STATUS, "");
        assert_eq!(report.state, EncryptionState::Unlocked);
        assert_eq!(report.encryption_percentage, 100);
        assert_eq!(report.encryption_method, "XTS-AES 128");
    }

    #[test]
    fn locked_volume_detected() {
        let report = parse_status_output("D:", LOCKED_STATUS, "");
        assert_eq!(report.state, EncryptionState::Locked);
    }

    #[test]
    fn decrypted_volume_is_not_encrypted() {
        let report = parse_status_output("E:", PLAIN_STATUS, "");
        assert_eq!(report.state, EncryptionState::NotEncrypted);
    }

    #[test]
    fn empty_output_defaults_to_unencrypted() {
        let report = parse_status_output("C:", "", "");
        assert_eq!(report.state, EncryptionState::NotEncrypted);
        assert_eq!(report.protection, "unable to determine");
    }

    #[test]
    fn image_specs_are_never_encrypted() {
        let spec = VolumeSpec::parse("/tmp/volume.img");
        let report = status(&spec);
        assert_eq!(report.state, EncryptionState::NotEncrypted);
    }
}
