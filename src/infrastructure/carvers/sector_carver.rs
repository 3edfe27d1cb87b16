//! Sector carver
//!
//! Scans raw sectors for file-type signatures, independent of any
//! metadata. Types with a footer are sized to the footer within the
//! type's plausible maximum; types without one yield only a small
//! bounded fragment, since sizing them to the maximum would capture
//! unrelated trailing data. The pass stops at whichever cap is
//! reached first, and the terminating reason is part of the result,
//! not just a log line.

use crate::domain::cancel::CancelToken;
use crate::domain::entities::{CarveStop, FileSignature};
use crate::domain::repositories::{VolumeAccess, VolumeAccessError};
use crate::domain::services::SignatureRegistry;
use memchr::memmem;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Read granularity of the carving pass
const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Chunk overlap so headers straddling a boundary are not missed
const OVERLAP: usize = 64;

/// Upper bound on one footer search window
const FOOTER_WINDOW: usize = 8 * 1024 * 1024;

/// Smallest believable footer-confirmed file
const MIN_CARVE_SIZE: u64 = 100;

/// MP4 brand codes accepted after "ftyp"
const MP4_BRANDS: [&[u8; 4]; 12] = [
    b"isom", b"mp41", b"mp42", b"M4V ", b"qt  ", b"MSNV", b"3gp4", b"3gp5", b"avc1", b"M4A ",
    b"f4v ", b"dash",
];

/// Caps on one carving pass; all caller-configurable
#[derive(Debug, Clone)]
pub struct CarveLimits {
    pub max_sectors: u64,
    pub max_duration: Duration,
    pub max_results: usize,
    /// Fragment length for footerless types, in clusters
    pub fragment_clusters: u64,
}

impl Default for CarveLimits {
    fn default() -> Self {
        Self {
            max_sectors: 2_000_000,
            max_duration: Duration::from_secs(600),
            max_results: 50_000,
            fragment_clusters: 4,
        }
    }
}

/// One signature hit on the volume
#[derive(Debug, Clone)]
pub struct CarvedHit {
    /// Absolute byte offset of the file start
    pub offset: u64,
    /// Bytes to read back: to the footer when confirmed, the
    /// fragment cap otherwise
    pub length: u64,
    pub signature: &'static FileSignature,
    pub footer_confirmed: bool,
    /// First bytes at the hit, hex-encoded, for the host UI
    pub header_preview: String,
}

/// Result of one carving pass
#[derive(Debug)]
pub struct CarveOutcome {
    pub hits: Vec<CarvedHit>,
    pub sectors_scanned: u64,
    pub stop: CarveStop,
}

/// Signature-driven carver over raw sectors
pub struct SectorCarver<'a> {
    registry: &'a SignatureRegistry,
}

impl<'a> SectorCarver<'a> {
    pub fn new(registry: &'a SignatureRegistry) -> Self {
        Self { registry }
    }

    /// Runs the carving pass
    ///
    /// `progress` receives (sectors scanned, hits so far) once per
    /// chunk so the caller can tell working from hung.
    pub fn carve(
        &self,
        volume: &dyn VolumeAccess,
        limits: &CarveLimits,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(u64, usize),
    ) -> Result<CarveOutcome, VolumeAccessError> {
        let started = Instant::now();
        let geometry = *volume.geometry();
        let sector_size = geometry.bytes_per_sector as u64;
        let fragment_len = limits.fragment_clusters * geometry.cluster_size as u64;
        let volume_size = geometry.total_size;

        let mut hits: Vec<CarvedHit> = Vec::new();
        let mut pos = 0u64;
        let mut sectors_scanned = 0u64;
        // End of the last footer-confirmed carve; matches inside it
        // are its own embedded content, not independent files
        let mut claimed_until = 0u64;

        let stop = loop {
            if cancel.is_cancelled() {
                break CarveStop::Cancelled;
            }
            if started.elapsed() >= limits.max_duration {
                break CarveStop::TimeLimit;
            }
            if sectors_scanned >= limits.max_sectors {
                break CarveStop::SectorLimit;
            }
            if pos >= volume_size {
                break CarveStop::EndOfVolume;
            }

            // A bad region is skipped, not fatal; the pass keeps going
            let chunk = match volume.read_at(pos, CHUNK_SIZE) {
                Ok(chunk) => chunk,
                Err(err) => {
                    debug!(offset = pos, %err, "unreadable region skipped during carving");
                    pos += CHUNK_SIZE as u64;
                    sectors_scanned = pos.div_ceil(sector_size);
                    continue;
                }
            };
            if chunk.is_empty() {
                break CarveStop::EndOfVolume;
            }
            let is_last_chunk = pos + chunk.len() as u64 >= volume_size;
            // The overlap tail is rescanned by the next chunk
            let advance = if is_last_chunk {
                chunk.len()
            } else {
                chunk.len().saturating_sub(OVERLAP).max(1)
            };

            let mut result_cap_hit = false;
            for (index, signature) in self.registry.find_headers(&chunk) {
                if index >= advance && !is_last_chunk {
                    continue;
                }

                let Some(start) = carve_start(&chunk, index, signature) else {
                    continue;
                };
                let absolute = pos + start as u64;
                if absolute < claimed_until {
                    continue;
                }

                let hit =
                    self.size_hit(volume, &chunk, start, absolute, signature, fragment_len, volume_size);
                let Some(hit) = hit else { continue };

                if hit.footer_confirmed {
                    claimed_until = hit.offset + hit.length;
                }
                hits.push(hit);

                if hits.len() >= limits.max_results {
                    result_cap_hit = true;
                    break;
                }
            }

            pos += advance as u64;
            sectors_scanned = pos.div_ceil(sector_size);
            progress(sectors_scanned, hits.len());

            if result_cap_hit {
                break CarveStop::ResultLimit;
            }
        };

        info!(
            hits = hits.len(),
            sectors_scanned,
            ?stop,
            "carving pass finished"
        );
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "carving timing");

        Ok(CarveOutcome {
            hits,
            sectors_scanned,
            stop,
        })
    }

    /// Determines the extent of one hit
    #[allow(clippy::too_many_arguments)]
    fn size_hit(
        &self,
        volume: &dyn VolumeAccess,
        chunk: &[u8],
        start: usize,
        absolute: u64,
        signature: &'static FileSignature,
        fragment_len: u64,
        volume_size: u64,
    ) -> Option<CarvedHit> {
        let remaining = volume_size - absolute;
        let preview_end = (start + 16).min(chunk.len());
        let header_preview = hex::encode(&chunk[start..preview_end]);

        if let Some(footer) = signature.footer {
            // Search the already-read chunk first, then widen to a
            // bounded read-ahead window
            let search_cap = signature.max_size.min(FOOTER_WINDOW as u64).min(remaining);
            let in_chunk = &chunk[start..chunk.len().min(start + search_cap as usize)];

            let found = match memmem::find(&in_chunk[signature.header.len()..], footer) {
                Some(at) => Some(signature.header.len() + at),
                None if (in_chunk.len() as u64) < search_cap => {
                    // An unreadable window downgrades the hit to a
                    // fragment instead of failing the pass
                    match volume.read_at(absolute, search_cap as usize) {
                        Ok(window) => memmem::find(&window[signature.header.len()..], footer)
                            .map(|at| signature.header.len() + at),
                        Err(_) => None,
                    }
                }
                None => None,
            };

            if let Some(at) = found {
                let length = (at + footer.len()) as u64;
                if length < MIN_CARVE_SIZE {
                    return None;
                }
                return Some(CarvedHit {
                    offset: absolute,
                    length,
                    signature,
                    footer_confirmed: true,
                    header_preview,
                });
            }
        }

        // No footer pattern, or the footer was not found in bounds:
        // keep a bounded leading fragment, never the plausible maximum
        let length = fragment_len.min(remaining).min(signature.max_size);
        if length == 0 {
            return None;
        }
        Some(CarvedHit {
            offset: absolute,
            length,
            signature,
            footer_confirmed: false,
            header_preview,
        })
    }
}

/// Validates a header hit and returns the true file start
///
/// Most signatures start the file at the match; the MP4 "ftyp" box
/// starts four bytes earlier, and the RIFF container is ambiguous
/// between AVI and WAV until the format tag is read.
fn carve_start(chunk: &[u8], index: usize, signature: &FileSignature) -> Option<usize> {
    match signature.extension {
        "mp4" => {
            if index < 4 {
                return None;
            }
            let size_bytes = &chunk[index - 4..index];
            let box_size = u32::from_be_bytes([
                size_bytes[0],
                size_bytes[1],
                size_bytes[2],
                size_bytes[3],
            ]);
            if !(8..=64).contains(&box_size) {
                return None;
            }
            let brand = chunk.get(index + 4..index + 8)?;
            if !MP4_BRANDS.iter().any(|b| *b == brand) {
                return None;
            }
            Some(index - 4)
        }
        "avi" => {
            let tag = chunk.get(index + 8..index + 12)?;
            (tag == b"AVI ").then_some(index)
        }
        "wav" => {
            let tag = chunk.get(index + 8..index + 12)?;
            (tag == b"WAVE").then_some(index)
        }
        _ => Some(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp4_requires_plausible_box_and_brand() {
        let mut chunk = vec![0u8; 64];
        chunk[4..8].copy_from_slice(b"ftyp");
        chunk[0..4].copy_from_slice(&24u32.to_be_bytes());
        chunk[8..12].copy_from_slice(b"isom");

        let sig = FileSignature {
            name: "MP4 Video",
            extension: "mp4",
            header: b"ftyp",
            footer: None,
            max_size: 1 << 30,
            category: "Videos",
        };
        assert_eq!(carve_start(&chunk, 4, &sig), Some(0));

        chunk[8..12].copy_from_slice(b"zzzz");
        assert_eq!(carve_start(&chunk, 4, &sig), None);
    }

    #[test]
    fn riff_tag_disambiguates_avi_and_wav() {
        let mut chunk = vec![0u8; 32];
        chunk[0..4].copy_from_slice(b"RIFF");
        chunk[8..12].copy_from_slice(b"WAVE");

        let avi = FileSignature {
            name: "AVI Video",
            extension: "avi",
            header: b"RIFF",
            footer: None,
            max_size: 1 << 30,
            category: "Videos",
        };
        let wav = FileSignature {
            name: "WAV Audio",
            extension: "wav",
            header: b"RIFF",
            footer: None,
            max_size: 1 << 30,
            category: "Audio",
        };
        assert_eq!(carve_start(&chunk, 0, &avi), None);
        assert_eq!(carve_start(&chunk, 0, &wav), Some(0));
    }
}
