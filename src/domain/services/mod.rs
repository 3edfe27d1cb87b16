//! Domain services

mod confidence;
mod signature_registry;

pub use confidence::{
    ConfidenceScorer, FOOTER_CARVE_SCORE, FRAGMENT_CARVE_SCORE, JOURNAL_BASELINE,
    LIKELY_OVERWRITTEN_THRESHOLD, SIGNATURE_MATCH_SCORE,
};
pub use signature_registry::SignatureRegistry;
