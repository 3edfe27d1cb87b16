//! Content carvers

mod sector_carver;

pub use sector_carver::{CarveLimits, CarveOutcome, CarvedHit, SectorCarver};
