//! CLI commands using clap
//!
//! The command surface of the engine subprocess. Every command prints
//! exactly one JSON object to stdout; progress and diagnostics go to
//! stderr, one message per line.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Salvage - NTFS file recovery engine
///
/// Recovers deleted files from NTFS volumes through metadata-index
/// parsing, change-journal scanning, and raw-sector carving.
#[derive(Parser)]
#[command(name = "salvage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recover deleted files from NTFS volumes", long_about = None)]
pub struct Cli {
    /// Enable debug diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List volumes eligible for scanning
    ListVolumes,

    /// Check whether the process has raw-volume privileges
    CheckPrivilege,

    /// Scan a volume for recoverable files
    Scan {
        /// Drive letter (e.g. C:) or path to a raw volume image
        volume: String,

        /// Scan mode: quick or deep
        mode: String,

        /// Override the metadata record limit
        #[arg(long)]
        max_records: Option<usize>,

        /// Override the carving sector cap (deep mode)
        #[arg(long)]
        max_sectors: Option<u64>,

        /// Override the carving time cap in seconds (deep mode)
        #[arg(long)]
        max_carve_seconds: Option<u64>,

        /// Override the carved-result cap (deep mode)
        #[arg(long)]
        max_carved_files: Option<usize>,
    },

    /// Recover one candidate to a destination directory
    RecoverOne {
        /// Drive letter or image path the candidate came from
        volume: String,

        /// The candidate as JSON, exactly as emitted by scan
        file_json: String,

        /// Destination directory
        dest_path: PathBuf,
    },

    /// Recover several candidates to a shared destination
    RecoverBatch {
        /// Drive letter or image path the candidates came from
        volume: String,

        /// JSON array of candidates, as emitted by scan
        files_json: String,

        /// Destination directory
        dest_path: PathBuf,

        /// Concurrent recovery workers
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
    },

    /// Report a volume's encryption status
    EncryptionStatus { volume: String },

    /// Unlock an encrypted volume with a password
    EncryptionUnlockPassword { volume: String, secret: String },

    /// Unlock an encrypted volume with a recovery key
    EncryptionUnlockKey { volume: String, key: String },

    /// Lock an encrypted volume
    EncryptionLock { volume: String },

    /// List the built-in carving signatures
    ListSignatures,

    /// Check whether volume snapshots are available
    SnapshotCheck,

    /// List snapshots of a volume
    SnapshotList { volume: String },

    /// List files inside a snapshot, optionally under a subpath
    SnapshotBrowse {
        /// The snapshot as JSON, exactly as emitted by snapshot-list
        snapshot_json: String,

        /// Subpath inside the snapshot
        path: Option<String>,
    },

    /// Copy one file out of a snapshot
    SnapshotRecover {
        snapshot_json: String,
        source: String,
        dest: String,
    },
}
