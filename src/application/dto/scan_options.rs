//! Scan options
//!
//! Mode and limits for one scan invocation. The engine is stateless
//! between invocations: a scan is a pure function of
//! (volume snapshot, mode, limits).

use crate::infrastructure::carvers::CarveLimits;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Quick scans read the metadata index and journal; deep scans raise
/// the record limit and add sector carving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    Quick,
    Deep,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Quick => "quick",
            ScanMode::Deep => "deep",
        }
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(ScanMode::Quick),
            "deep" => Ok(ScanMode::Deep),
            other => Err(format!("unknown scan mode '{other}', expected quick or deep")),
        }
    }
}

/// Caps applied during one scan
#[derive(Debug, Clone)]
pub struct ScanLimits {
    /// Maximum metadata records to read
    pub max_metadata_records: usize,
    /// Caps on the carving pass (deep mode only)
    pub carve: CarveLimits,
}

impl ScanLimits {
    /// Default limits for a mode
    ///
    /// Quick keeps the record walk short enough for an interactive
    /// first pass; deep doubles it and enables carving with its own
    /// sector/time/result caps.
    pub fn for_mode(mode: ScanMode) -> Self {
        match mode {
            ScanMode::Quick => Self {
                max_metadata_records: 250_000,
                carve: CarveLimits::default(),
            },
            ScanMode::Deep => Self {
                max_metadata_records: 500_000,
                carve: CarveLimits::default(),
            },
        }
    }
}

/// Everything one scan invocation needs besides the volume
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub mode: ScanMode,
    pub limits: ScanLimits,
}

impl ScanOptions {
    pub fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            limits: ScanLimits::for_mode(mode),
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.limits.max_metadata_records = max_records;
        self
    }

    pub fn with_max_carve_sectors(mut self, max_sectors: u64) -> Self {
        self.limits.carve.max_sectors = max_sectors;
        self
    }

    pub fn with_max_carve_duration(mut self, duration: Duration) -> Self {
        self.limits.carve.max_duration = duration;
        self
    }

    pub fn with_max_carved_files(mut self, max_results: usize) -> Self {
        self.limits.carve.max_results = max_results;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!("quick".parse::<ScanMode>().unwrap(), ScanMode::Quick);
        assert_eq!("DEEP".parse::<ScanMode>().unwrap(), ScanMode::Deep);
        assert!("full".parse::<ScanMode>().is_err());
    }

    #[test]
    fn deep_limits_exceed_quick() {
        let quick = ScanLimits::for_mode(ScanMode::Quick);
        let deep = ScanLimits::for_mode(ScanMode::Deep);
        assert!(deep.max_metadata_records > quick.max_metadata_records);
    }
}
