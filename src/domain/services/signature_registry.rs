//! Signature registry service
//!
//! The table of known file signatures and an Aho-Corasick automaton
//! over their headers for single-pass multi-pattern scanning.

use crate::domain::entities::{FileSignature, SignatureSummary};
use aho_corasick::AhoCorasick;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Built-in signature table
///
/// Entries with a footer can be carved to their true end; entries
/// without one are only ever carved as bounded fragments.
static SIGNATURES: &[FileSignature] = &[
    FileSignature {
        name: "JPEG Image",
        extension: "jpg",
        header: &[0xFF, 0xD8, 0xFF],
        footer: Some(&[0xFF, 0xD9]),
        max_size: 50 * MB,
        category: "Images",
    },
    FileSignature {
        name: "PNG Image",
        extension: "png",
        header: &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        footer: Some(&[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82]),
        max_size: 100 * MB,
        category: "Images",
    },
    FileSignature {
        name: "GIF Image",
        extension: "gif",
        header: &[0x47, 0x49, 0x46, 0x38],
        footer: Some(&[0x00, 0x3B]),
        max_size: 20 * MB,
        category: "Images",
    },
    FileSignature {
        name: "Bitmap Image",
        extension: "bmp",
        header: &[0x42, 0x4D],
        footer: None,
        max_size: 100 * MB,
        category: "Images",
    },
    FileSignature {
        name: "PDF Document",
        extension: "pdf",
        header: b"%PDF",
        footer: Some(b"%%EOF"),
        max_size: 500 * MB,
        category: "Documents",
    },
    // ZIP container; also covers the Office Open XML family
    FileSignature {
        name: "ZIP Archive",
        extension: "zip",
        header: &[0x50, 0x4B, 0x03, 0x04],
        footer: None,
        max_size: 2 * GB,
        category: "Archives",
    },
    FileSignature {
        name: "Word Document",
        extension: "doc",
        header: &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1],
        footer: None,
        max_size: 100 * MB,
        category: "Documents",
    },
    FileSignature {
        name: "Rich Text Document",
        extension: "rtf",
        header: b"{\\rtf",
        footer: Some(b"}"),
        max_size: 50 * MB,
        category: "Documents",
    },
    // The ftyp brand check in the carver guards this one against the
    // high false-positive rate of a 4-byte pattern at offset 4
    FileSignature {
        name: "MP4 Video",
        extension: "mp4",
        header: b"ftyp",
        footer: None,
        max_size: 10 * GB,
        category: "Videos",
    },
    FileSignature {
        name: "AVI Video",
        extension: "avi",
        header: b"RIFF",
        footer: None,
        max_size: 10 * GB,
        category: "Videos",
    },
    FileSignature {
        name: "Matroska Video",
        extension: "mkv",
        header: &[0x1A, 0x45, 0xDF, 0xA3],
        footer: None,
        max_size: 10 * GB,
        category: "Videos",
    },
    FileSignature {
        name: "MP3 Audio",
        extension: "mp3",
        header: &[0xFF, 0xFB],
        footer: None,
        max_size: 100 * MB,
        category: "Audio",
    },
    FileSignature {
        name: "MP3 Audio (ID3)",
        extension: "mp3",
        header: b"ID3",
        footer: None,
        max_size: 100 * MB,
        category: "Audio",
    },
    FileSignature {
        name: "WAV Audio",
        extension: "wav",
        header: b"RIFF",
        footer: None,
        max_size: 500 * MB,
        category: "Audio",
    },
    FileSignature {
        name: "FLAC Audio",
        extension: "flac",
        header: b"fLaC",
        footer: None,
        max_size: 500 * MB,
        category: "Audio",
    },
    FileSignature {
        name: "OGG Audio",
        extension: "ogg",
        header: b"OggS",
        footer: None,
        max_size: 100 * MB,
        category: "Audio",
    },
    FileSignature {
        name: "7-Zip Archive",
        extension: "7z",
        header: &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C],
        footer: None,
        max_size: 2 * GB,
        category: "Archives",
    },
    FileSignature {
        name: "RAR Archive",
        extension: "rar",
        header: &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07],
        footer: None,
        max_size: 2 * GB,
        category: "Archives",
    },
    FileSignature {
        name: "SQLite Database",
        extension: "sqlite",
        header: b"SQLite format 3\x00",
        footer: None,
        max_size: 2 * GB,
        category: "Databases",
    },
    FileSignature {
        name: "Windows Executable",
        extension: "exe",
        header: &[0x4D, 0x5A],
        footer: None,
        max_size: 500 * MB,
        category: "Executables",
    },
];

/// Registry over the built-in signature table
///
/// The header automaton finds every signature occurrence in a buffer
/// in one pass; extension lookup serves the confidence scorer and the
/// recovery writer's post-read header check.
#[derive(Debug)]
pub struct SignatureRegistry {
    automaton: AhoCorasick,
}

impl SignatureRegistry {
    /// Builds the registry with the built-in table
    pub fn new() -> Self {
        let patterns: Vec<&[u8]> = SIGNATURES.iter().map(|sig| sig.header).collect();
        // The table is static and non-empty; construction cannot fail
        let automaton = AhoCorasick::new(patterns).expect("signature automaton");
        Self { automaton }
    }

    /// All signatures in table order
    pub fn all(&self) -> &'static [FileSignature] {
        SIGNATURES
    }

    /// Wire-facing summaries for `list-signatures`
    pub fn summaries(&self) -> Vec<SignatureSummary> {
        SIGNATURES.iter().map(SignatureSummary::from).collect()
    }

    /// First signature registered for an extension, if any
    ///
    /// Extensions that alias the same container map to their
    /// canonical signature (e.g. docx/xlsx/pptx to the ZIP header).
    pub fn for_extension(&self, extension: &str) -> Option<&'static FileSignature> {
        let ext = extension.to_ascii_lowercase();
        let canonical = match ext.as_str() {
            "jpeg" => "jpg",
            "docx" | "xlsx" | "pptx" => "zip",
            "tif" => "tiff",
            "db" | "sqlite3" => "sqlite",
            other => other,
        };
        SIGNATURES.iter().find(|sig| sig.extension == canonical)
    }

    /// Finds every header occurrence in `data`, overlapping included,
    /// as `(offset, signature)` pairs
    pub fn find_headers<'a>(&'a self, data: &'a [u8]) -> impl Iterator<Item = (usize, &'static FileSignature)> + 'a {
        self.automaton
            .find_overlapping_iter(data)
            .map(|mat| (mat.start(), &SIGNATURES[mat.pattern().as_usize()]))
    }

    /// Checks `data` against the signature expected for `extension`;
    /// `None` when no signature is known for it
    pub fn header_matches(&self, extension: &str, data: &[u8]) -> Option<bool> {
        self.for_extension(extension)
            .map(|sig| sig.matches_header(data))
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}
