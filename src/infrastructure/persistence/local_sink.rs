//! Local filesystem sink
//!
//! Writes reconstructed files under a destination directory. Data
//! lands in a dot-prefixed temp file and is renamed into place only
//! once complete, so a file never exists partially written under its
//! final name. Names are sanitized for the destination filesystem and
//! suffixed on collision.

use crate::domain::repositories::{RecoveredFileSink, RecoveryWriteError, WriteReceipt};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Characters rejected by common destination filesystems
const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

/// Cap on collision-suffix probing before falling back to a counter
const MAX_SUFFIX_PROBES: u32 = 1000;

/// Local destination-directory sink
pub struct LocalFileSink {
    dest_dir: PathBuf,
    /// Distinguishes temp names across concurrent batch workers
    temp_counter: AtomicU64,
}

impl LocalFileSink {
    /// Creates the sink, creating the destination directory if needed
    pub fn new(dest_dir: &Path) -> Result<Self, RecoveryWriteError> {
        if !dest_dir.exists() {
            fs::create_dir_all(dest_dir).map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    RecoveryWriteError::PermissionDenied(dest_dir.display().to_string())
                } else {
                    RecoveryWriteError::DestinationUnavailable(format!(
                        "{}: {e}",
                        dest_dir.display()
                    ))
                }
            })?;
        }

        Ok(Self {
            dest_dir: dest_dir.to_path_buf(),
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Picks a final path that does not collide with existing files
    fn unique_path(&self, sanitized: &str) -> PathBuf {
        let candidate = self.dest_dir.join(sanitized);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, extension) = match sanitized.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (sanitized, None),
        };

        for n in 1..=MAX_SUFFIX_PROBES {
            let name = match extension {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            let candidate = self.dest_dir.join(name);
            if !candidate.exists() {
                return candidate;
            }
        }

        // Pathological destination; fall back to a unique counter name
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.dest_dir.join(format!("{stem}.{n}"))
    }
}

impl RecoveredFileSink for LocalFileSink {
    fn write(&self, preferred_name: &str, data: &[u8]) -> Result<WriteReceipt, RecoveryWriteError> {
        let sanitized = sanitize_file_name(preferred_name);
        let final_path = self.unique_path(&sanitized);

        let temp_id = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let temp_name = format!(
            ".{}.{temp_id}.part",
            final_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "recovered".to_string())
        );
        let temp_path = self.dest_dir.join(temp_name);

        let write_result = (|| -> Result<(), RecoveryWriteError> {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }

        if let Err(err) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(RecoveryWriteError::Io(err));
        }

        debug!(path = %final_path.display(), bytes = data.len(), "file written");
        Ok(WriteReceipt {
            path: final_path,
            bytes: data.len() as u64,
        })
    }

    fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }
}

/// Sanitizes a recovered name for the destination filesystem
///
/// Path separators and reserved characters become underscores; names
/// that sanitize to nothing get a placeholder.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if RESERVED.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "recovered.bin".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_separators_and_reserved() {
        assert_eq!(sanitize_file_name("a/b\\c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_file_name("con:fig?.ini"), "con_fig_.ini");
        assert_eq!(sanitize_file_name("...   "), "recovered.bin");
        assert_eq!(sanitize_file_name("plain.pdf"), "plain.pdf");
    }
}
