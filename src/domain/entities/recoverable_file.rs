//! Recoverable file entity
//!
//! The central entity of a scan: one candidate for recovery, located
//! either through the metadata index, the change journal, or raw
//! sector carving. Immutable after the scan pass that created it,
//! except for the confidence annotation applied by the scorer.

use serde::{Deserialize, Serialize};

/// Which scan pass produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoverySource {
    /// Found as a deleted record in the volume's metadata index (MFT)
    MetadataIndex,
    /// Found only in the change journal; its index slot has been
    /// recycled and any run information is no longer authoritative
    Journal,
    /// Found by byte-signature carving with no index trace
    Carved,
}

/// One contiguous cluster extent of a file's content
///
/// `lcn` is `None` for sparse or compressed runs, which occupy no
/// physical clusters and carry only a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRun {
    /// Logical cluster number of the first cluster, absolute on the
    /// volume; `None` when the run has no physical extent
    pub lcn: Option<u64>,
    /// Number of clusters in the run
    pub clusters: u64,
}

/// Byte region of a carved candidate (no cluster mapping exists)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarveRegion {
    /// Absolute byte offset on the volume
    pub offset: u64,
    /// Length in bytes to read back
    pub length: u64,
}

/// A file that can potentially be recovered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverableFile {
    /// Stable id, unique within one scan's result set; also the
    /// deduplication key across scan passes
    pub id: String,
    /// File name, or a synthetic name for carved candidates
    pub name: String,
    /// Original path where known; synthetic for carved candidates
    pub path: String,
    /// Size in bytes (estimated for carved candidates)
    pub size: u64,
    /// Lowercased extension without the dot, empty when unknown
    pub extension: String,
    /// Browse category derived from the extension
    pub category: String,
    /// Human-readable type name derived from the extension
    pub type_name: String,
    /// Which scan pass produced this candidate
    pub source: RecoverySource,
    pub is_deleted: bool,
    /// Creation timestamp, absent for carved candidates
    pub created: Option<String>,
    /// Modification timestamp, absent for carved candidates
    pub modified: Option<String>,
    /// Rough estimate of when the file was deleted
    pub age_estimate: Option<String>,
    /// Cluster extents holding the content (metadata/journal sources)
    pub cluster_runs: Vec<ClusterRun>,
    /// Byte region holding the content (carved source)
    pub carve_region: Option<CarveRegion>,
    /// True when only a bounded leading fragment was located; never
    /// set on footer-confirmed carves
    pub fragment: bool,
    /// Set by the scorer when the first referenced cluster no longer
    /// matches the file's expected signature
    pub likely_overwritten: bool,
    /// Recovery confidence, 0-100
    pub confidence: u8,
}

impl RecoverableFile {
    /// Returns true when any run in the list has a physical extent
    pub fn has_physical_runs(&self) -> bool {
        self.cluster_runs.iter().any(|run| run.lcn.is_some())
    }

    /// First run with a physical extent, if any
    pub fn first_physical_run(&self) -> Option<&ClusterRun> {
        self.cluster_runs.iter().find(|run| run.lcn.is_some())
    }
}

/// Maps an extension to the browse category shown by the host UI
pub fn category_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "tiff" | "ico" | "svg" => "Images",
        "mp4" | "avi" | "mkv" | "mov" | "wmv" | "flv" | "webm" | "m4v" => "Videos",
        "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" => "Audio",
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" | "rtf" | "odt" => {
            "Documents"
        }
        "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" => "Archives",
        "exe" | "dll" | "msi" | "bat" | "cmd" | "ps1" => "Executables",
        "html" | "htm" | "css" | "js" | "json" | "xml" => "Web",
        "sql" | "db" | "sqlite" | "mdb" => "Databases",
        _ => "Other",
    }
}

/// Human-readable type name for an extension
pub fn type_name_for_extension(ext: &str) -> String {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "JPEG Image".to_string(),
        "png" => "PNG Image".to_string(),
        "gif" => "GIF Image".to_string(),
        "bmp" => "Bitmap Image".to_string(),
        "pdf" => "PDF Document".to_string(),
        "doc" | "docx" => "Word Document".to_string(),
        "xls" | "xlsx" => "Excel Spreadsheet".to_string(),
        "mp3" => "MP3 Audio".to_string(),
        "mp4" => "MP4 Video".to_string(),
        "avi" => "AVI Video".to_string(),
        "zip" => "ZIP Archive".to_string(),
        "exe" => "Windows Executable".to_string(),
        "" => "File".to_string(),
        other => format!("{} File", other.to_uppercase()),
    }
}

/// Rough estimate of how long ago a file was last touched
pub fn estimate_age(modified_unix: i64, now_unix: i64) -> String {
    if modified_unix <= 0 || now_unix < modified_unix {
        return "unknown".to_string();
    }

    let days = (now_unix - modified_unix) / 86_400;
    match days {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        2..=7 => "this week".to_string(),
        8..=30 => "this month".to_string(),
        31..=90 => "1-3 months ago".to_string(),
        91..=180 => "3-6 months ago".to_string(),
        181..=365 => "6-12 months ago".to_string(),
        366..=730 => "1-2 years ago".to_string(),
        _ => format!("{} years ago", days / 365),
    }
}
