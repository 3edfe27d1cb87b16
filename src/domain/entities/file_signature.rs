//! File signature entity
//!
//! Magic-byte patterns identifying file types on raw sectors. The
//! header is mandatory; the footer is optional, and its absence
//! changes carving behavior (fragment-only, see the sector carver).

use serde::{Deserialize, Serialize};

/// A known file signature for carving and header validation
#[derive(Debug, Clone, Copy)]
pub struct FileSignature {
    /// Human-readable type name
    pub name: &'static str,
    /// Primary extension, lowercased, without the dot
    pub extension: &'static str,
    /// Magic bytes at the start of the file
    pub header: &'static [u8],
    /// Magic bytes terminating the file, when the format has them
    pub footer: Option<&'static [u8]>,
    /// Maximum plausible size; bounds the footer search, never used
    /// as a default carve length
    pub max_size: u64,
    /// Browse category for the host UI
    pub category: &'static str,
}

impl FileSignature {
    /// Checks whether `data` begins with this signature's header
    pub fn matches_header(&self, data: &[u8]) -> bool {
        data.len() >= self.header.len() && &data[..self.header.len()] == self.header
    }

    /// Returns whether the format has a terminating pattern
    pub fn has_footer(&self) -> bool {
        self.footer.is_some()
    }
}

/// Wire-facing summary of one signature, for `list-signatures`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub extension: String,
    pub name: String,
    pub category: String,
    pub has_footer: bool,
    pub max_size: u64,
}

impl From<&FileSignature> for SignatureSummary {
    fn from(sig: &FileSignature) -> Self {
        Self {
            extension: sig.extension.to_string(),
            name: sig.name.to_string(),
            category: sig.category.to_string(),
            has_footer: sig.has_footer(),
            max_size: sig.max_size,
        }
    }
}
