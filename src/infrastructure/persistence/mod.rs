//! Destination-side persistence

mod local_sink;
mod recovery_writer;

pub use local_sink::{sanitize_file_name, LocalFileSink};
pub use recovery_writer::RecoveryWriter;
