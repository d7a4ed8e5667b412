//! # Utility Functions Module
//!
//! Small formatting helpers shared by the progress bar and the JSON output.

use crate::settings::Quality;

/// Human-readable remaining time: `< 1s`, `42s` or `3m 7s`.
///
/// # Example
/// ```rust
/// use jpegifier::utils::format_eta;
///
/// assert_eq!(format_eta(187_000), "3m 7s");
/// ```
pub fn format_eta(ms: u64) -> String {
    if ms < 1000 {
        return "< 1s".to_string();
    }
    let seconds = ms / 1000;
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    format!("{}m {}s", seconds / 60, seconds % 60)
}

/// Short stage label used in file names and messages, e.g. `50x_q30`.
pub fn stage_label(iterations: u32, quality: Quality) -> String {
    format!("{}x_q{}", iterations, quality.percent())
}
