//! Volume entity
//!
//! A read-only snapshot of a mountable volume as seen at scan start.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Full-volume encryption status as reported by the encryption gate
///
/// `Unlocked` is distinct from `NotEncrypted` on purpose: an unlocked
/// BitLocker volume is mounted and readable through the filesystem,
/// but raw sector reads return ciphertext. The orchestrator routes
/// such volumes to the mediated engine instead of probing and silently
/// falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionState {
    /// Volume is not encrypted; raw sector access is viable
    #[serde(rename = "none")]
    NotEncrypted,
    /// Volume is encrypted and locked; no recovery path is available
    Locked,
    /// Volume is encrypted but currently unlocked; only the mediated
    /// engine produces trustworthy reads
    Unlocked,
}

impl fmt::Display for EncryptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionState::NotEncrypted => write!(f, "none"),
            EncryptionState::Locked => write!(f, "locked"),
            EncryptionState::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// A volume eligible for scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Mount identifier, e.g. "C:" on Windows
    pub mount: String,
    /// Volume label, if any
    pub label: String,
    /// Total capacity in bytes
    pub total_space: u64,
    /// Free space in bytes
    pub free_space: u64,
    /// Filesystem name as reported by the OS (e.g. "NTFS")
    pub filesystem: String,
    /// Encryption gate verdict for this volume
    pub encryption: EncryptionState,
}

/// How the caller named the volume to operate on
///
/// A drive letter addresses a live OS volume; any other string is
/// treated as a path to a raw volume image, which is also the portable
/// test surface on non-Windows hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSpec {
    /// A live volume addressed by drive letter (uppercased)
    DriveLetter(char),
    /// A raw volume image on the local filesystem
    ImagePath(PathBuf),
}

impl VolumeSpec {
    /// Parses a CLI volume argument
    ///
    /// Accepts "C", "C:", and "C:\" forms for drive letters; anything
    /// else becomes an image path.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_end_matches(['\\', '/']).trim_end_matches(':');
        if trimmed.len() == 1 {
            if let Some(letter) = trimmed.chars().next() {
                if letter.is_ascii_alphabetic() {
                    return VolumeSpec::DriveLetter(letter.to_ascii_uppercase());
                }
            }
        }
        VolumeSpec::ImagePath(PathBuf::from(raw))
    }

    /// Returns the path to open for raw access
    ///
    /// Drive letters map to the Windows volume namespace (`\\.\C:`);
    /// image paths are returned as-is.
    pub fn raw_path(&self) -> PathBuf {
        match self {
            VolumeSpec::DriveLetter(letter) => PathBuf::from(format!("\\\\.\\{}:", letter)),
            VolumeSpec::ImagePath(path) => path.clone(),
        }
    }

    /// Returns true when this spec names a live OS volume
    pub fn is_live_volume(&self) -> bool {
        matches!(self, VolumeSpec::DriveLetter(_))
    }

    /// Returns the drive letter with colon, when applicable
    pub fn drive(&self) -> Option<String> {
        match self {
            VolumeSpec::DriveLetter(letter) => Some(format!("{}:", letter)),
            VolumeSpec::ImagePath(_) => None,
        }
    }

    /// Returns true when the image path exists on disk
    pub fn image_exists(&self) -> bool {
        match self {
            VolumeSpec::DriveLetter(_) => true,
            VolumeSpec::ImagePath(path) => Path::new(path).is_file(),
        }
    }
}

impl fmt::Display for VolumeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeSpec::DriveLetter(letter) => write!(f, "{}:", letter),
            VolumeSpec::ImagePath(path) => write!(f, "{}", path.display()),
        }
    }
}
