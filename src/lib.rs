//! Salvage - NTFS file recovery engine
//!
//! Locates deleted, formatted, or otherwise inaccessible files on
//! NTFS volumes and reconstructs them at an operator-chosen
//! destination. Invoked as a subprocess: one JSON object on stdout,
//! diagnostics and progress lines on stderr.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
