/// Текущее время в миллисекундах (Unix epoch).
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Human-readable byte count with the same rounding as `pg_size_pretty`:
/// plain bytes below 10 kB, then half-rounded kB/MB/GB/TB.
pub fn pretty_size(bytes: i64) -> String {
    if bytes.abs() < 10 * 1024 {
        return format!("{bytes} bytes");
    }

    // в половинах единицы, чтобы округлять (x + 1) / 2
    let mut half = bytes >> 9;
    for unit in ["kB", "MB", "GB"] {
        if half.abs() < 20 * 1024 - 1 {
            return format!("{} {unit}", (half + 1) / 2);
        }
        half >>= 10;
    }
    format!("{} TB", (half + 1) / 2)
}

#[cfg(test)]
mod tests {
    use super::pretty_size;

    #[test]
    fn small_sizes_stay_in_bytes() {
        assert_eq!(pretty_size(0), "0 bytes");
        assert_eq!(pretty_size(8192), "8192 bytes");
        assert_eq!(pretty_size(10239), "10239 bytes");
    }

    #[test]
    fn larger_sizes_are_rounded() {
        assert_eq!(pretty_size(10240), "10 kB");
        assert_eq!(pretty_size(1536 * 1024), "1536 kB");
        assert_eq!(pretty_size(64 * 1024 * 1024), "64 MB");
        assert_eq!(pretty_size(3 * 1024 * 1024 * 1024 * 1024 * 1024), "3072 TB");
    }
}
