//! Progress reporting on stderr
//!
//! The host process matches `progress `-prefixed lines for live
//! updates while waiting for the final stdout payload. One event per
//! line, never interleaved with the result.

use serde::Serialize;
use std::io::Write;

/// Writes one progress event as a single stderr line
pub fn emit_progress<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = writeln!(lock, "progress {json}");
    }
}

/// Writes the final result payload as the single stdout JSON object
pub fn emit_result<T: Serialize>(payload: &T) {
    match serde_json::to_string(payload) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            // Still keep stdout parseable for the caller
            println!(
                "{}",
                serde_json::json!({
                    "success": false,
                    "message": format!("result serialization failed: {err}"),
                })
            );
        }
    }
}
