//! Byte size helpers.

/// Kibibytes to bytes.
#[inline]
pub const fn kib(n: usize) -> usize {
    n << 10
}

/// Mebibytes to bytes.
#[inline]
pub const fn mib(n: usize) -> usize {
    n << 20
}

/// Render a byte count for diagnostics, e.g. `"4.00 KiB"`.
pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit + 1 < UNITS.len() {
        scaled /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", scaled, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(kib(4), 4096);
        assert_eq!(mib(256), 256 * 1024 * 1024);
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(64), "64 B");
        assert_eq!(human_bytes(4096), "4.00 KiB");
        assert_eq!(human_bytes(mib(3) / 2), "1.50 MiB");
    }
}
