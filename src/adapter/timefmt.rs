// SPDX-License-Identifier: MIT

//! RouterOS duration rendering
//!
//! RouterOS accepts timeouts like `1d2h3m4s`. Zero-valued components are
//! omitted, and once the duration reaches a full day the seconds component
//! is dropped entirely; second-level precision on multi-day bans carries no
//! information worth the longer string.

/// Formats a second count as a RouterOS duration string
#[must_use]
pub fn seconds_to_router_time(total_seconds: u64) -> String {
    if total_seconds == 0 {
        return "0s".to_string();
    }

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d"));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 && days == 0 {
        out.push_str(&format!("{seconds}s"));
    }

    // all components zeroed out by the day rule, e.g. exactly 1d
    if out.is_empty() {
        out.push_str("0s");
    }
    out
}
