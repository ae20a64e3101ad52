//! Human readable sizes and durations for reports.

use std::time::Duration;

fn byte_count(bytes: u64, unit: u64, prefixes: &[u8; 6], suffix: &str) -> String {
    if bytes < unit {
        return format!("{} B", bytes);
    }
    let mut div = unit;
    let mut exp = 0usize;
    let mut n = bytes / unit;
    while n >= unit && exp + 1 < prefixes.len() {
        div *= unit;
        exp += 1;
        n /= unit;
    }
    format!("{:.1} {}{}", bytes as f64 / div as f64, prefixes[exp] as char, suffix)
}

/// Decimal units (kB = 1000).
pub fn byte_count_si(bytes: u64) -> String {
    byte_count(bytes, 1000, b"kMGTPE", "B")
}

/// Binary units (KiB = 1024).
pub fn byte_count_iec(bytes: u64) -> String {
    byte_count(bytes, 1024, b"KMGTPE", "iB")
}

/// `HH:MM:SS:mmmm`, rounded to the millisecond.
pub fn format_execution_time(elapsed: Duration) -> String {
    let total_ms = (elapsed.as_micros() + 500) / 1000;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let s = total_secs % 60;
    let m = (total_secs / 60) % 60;
    let h = total_secs / 3600;
    format!("{:02}:{:02}:{:02}:{:04}", h, m, s, ms)
}
