//! Volume access implementations
//!
//! Two engines behind one contract: `RawVolume` reads physical
//! sectors directly; `MediatedVolume` asks the OS for metadata
//! records and journal entries when raw sectors are not trustworthy
//! (full-volume encryption). The encryption gate's verdict selects
//! between them.

mod raw;
#[cfg(windows)]
mod mediated;
#[cfg(windows)]
pub(crate) mod win;

pub use raw::RawVolume;
#[cfg(windows)]
pub use mediated::MediatedVolume;
