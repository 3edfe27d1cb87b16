//! NTFS structure parsers
//!
//! Boot sector, MFT record, and USN journal decoding. Everything here
//! operates on borrowed byte slices and never touches the volume
//! directly; the volume access layer feeds it.

mod boot_sector;
mod journal;
mod record;

pub use boot_sector::{BootSector, BOOT_SECTOR_SIZE};
pub use journal::parse_usn_batch;
pub use record::{filetime_to_unix, MftRecord, RunListEntry};
