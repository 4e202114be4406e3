//! Human-readable formatting for CLI output and user-facing messages.

/// Format a byte count as a human-readable size (decimal units).
pub fn format_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1_000_000 => format!("{:.1} MB", b as f64 / 1_000_000.0),
        b if b >= 1_000 => format!("{:.1} KB", b as f64 / 1_000.0),
        b => format!("{} B", b),
    }
}

/// Format a configured byte limit exactly, in binary units when it divides
/// evenly (`10 * 1024 * 1024` is `"10 MiB"`).
pub fn format_limit(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    match bytes {
        b if b >= MIB && b % MIB == 0 => format!("{} MiB", b / MIB),
        b if b >= KIB && b % KIB == 0 => format!("{} KiB", b / KIB),
        b => format!("{} bytes", b),
    }
}

/// Format a before/after size pair, e.g. `"2.4 MB -> 310.2 KB (7.74x)"`.
pub fn format_reduction(before: u64, after: u64) -> String {
    let ratio = if after == 0 {
        1.0
    } else {
        before as f64 / after as f64
    };
    format!(
        "{} -> {} ({:.2}x)",
        format_size(before),
        format_size(after),
        ratio
    )
}
