//! Byte quantity formatting and parsing

const SI_PREFIXES: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];
const BINARY_PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Format a byte count with scaled unit prefixes
///
/// `si` selects 1000-based units (`kB`, `MB`, ...) over 1024-based ones
/// (`KiB`, `MiB`, ...). Counts below one unit are printed verbatim as `"<n> B"`.
/// The scaled value is rounded half up to one decimal.
///
/// ```
/// use memconsumer_core::units::human_bytes;
///
/// assert_eq!(human_bytes(512, false), "512 B");
/// assert_eq!(human_bytes(1_048_576, false), "1.0 MiB");
/// assert_eq!(human_bytes(1_500, true), "1.5 kB");
/// ```
pub fn human_bytes(bytes: u64, si: bool) -> String {
    let unit: u64 = if si { 1000 } else { 1024 };
    if bytes < unit {
        return format!("{} B", bytes);
    }

    // ln ratio can land a hair under an exact power; settle on the largest
    // exponent whose power does not exceed `bytes`.
    let mut exp = (((bytes as f64).ln() / (unit as f64).ln()) as u32).clamp(1, 6);
    while exp < 6 && unit.pow(exp + 1) <= bytes {
        exp += 1;
    }
    while exp > 1 && unit.pow(exp) > bytes {
        exp -= 1;
    }

    let idx = (exp - 1) as usize;
    let (prefix, infix) = if si {
        (SI_PREFIXES[idx], "")
    } else {
        (BINARY_PREFIXES[idx], "i")
    };
    let value = bytes as f64 / (unit as f64).powi(exp as i32);
    // `{:.1}` alone rounds ties to even
    let value = (value * 10.0).round() / 10.0;
    format!("{:.1} {}{}B", value, prefix, infix)
}

/// Parse a byte quantity such as `1073741824`, `512Mi`, `2G` or `64KiB`
///
/// Single-letter suffixes are decimal (`K` = 1000), `i` suffixes are binary
/// (`Ki` = 1024). A trailing `B` is accepted. Returns `None` on malformed
/// input or overflow.
pub fn parse_bytes(input: &str) -> Option<u64> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, suffix) = input.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    let suffix = suffix.trim_start();
    let suffix = suffix.strip_suffix('B').unwrap_or(suffix);
    let multiplier: u64 = match suffix {
        "" => 1,
        "k" | "K" => 1000,
        "M" => 1000u64.pow(2),
        "G" => 1000u64.pow(3),
        "T" => 1000u64.pow(4),
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_unit_is_verbatim() {
        for b in [0u64, 1, 7, 512, 1000, 1023] {
            assert_eq!(human_bytes(b, false), format!("{} B", b));
        }
        assert_eq!(human_bytes(999, true), "999 B");
    }

    #[test]
    fn test_binary_units() {
        assert_eq!(human_bytes(1024, false), "1.0 KiB");
        assert_eq!(human_bytes(1536, false), "1.5 KiB");
        assert_eq!(human_bytes(1_048_576, false), "1.0 MiB");
        assert_eq!(human_bytes(4 * 1_048_576, false), "4.0 MiB");
        assert_eq!(human_bytes(3 << 30, false), "3.0 GiB");
        assert_eq!(human_bytes(1 << 40, false), "1.0 TiB");
        assert_eq!(human_bytes(1 << 50, false), "1.0 PiB");
        assert_eq!(human_bytes(u64::MAX, false), "16.0 EiB");
    }

    #[test]
    fn test_ties_round_half_up() {
        assert_eq!(human_bytes(1280, false), "1.3 KiB");
        assert_eq!(human_bytes(1792, false), "1.8 KiB");
        assert_eq!(human_bytes(3328, false), "3.3 KiB");
        assert_eq!(human_bytes(1250, true), "1.3 kB");
        assert_eq!(human_bytes(1_048_575, false), "1024.0 KiB");
    }

    #[test]
    fn test_si_units() {
        assert_eq!(human_bytes(1000, true), "1.0 kB");
        assert_eq!(human_bytes(1_000_000, true), "1.0 MB");
        assert_eq!(human_bytes(2_500_000_000, true), "2.5 GB");
        assert_eq!(human_bytes(1_000_000_000_000_000_000, true), "1.0 EB");
    }

    #[test]
    fn test_exact_powers_do_not_drift() {
        for exp in 1..=6u32 {
            let bytes = 1000u64.pow(exp);
            assert!(human_bytes(bytes, true).starts_with("1.0 "), "{}", bytes);
        }
        for exp in 1..=6u32 {
            let bytes = 1024u64.pow(exp);
            assert!(human_bytes(bytes, false).starts_with("1.0 "), "{}", bytes);
        }
    }

    #[test]
    fn test_parse_plain_and_suffixed() {
        assert_eq!(parse_bytes("1073741824"), Some(1 << 30));
        assert_eq!(parse_bytes("512Mi"), Some(512 << 20));
        assert_eq!(parse_bytes("64KiB"), Some(64 << 10));
        assert_eq!(parse_bytes("2G"), Some(2_000_000_000));
        assert_eq!(parse_bytes("3 GB"), Some(3_000_000_000));
        assert_eq!(parse_bytes(" 1Ti "), Some(1 << 40));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_bytes(""), None);
        assert_eq!(parse_bytes("Mi"), None);
        assert_eq!(parse_bytes("-5"), None);
        assert_eq!(parse_bytes("1.5G"), None);
        assert_eq!(parse_bytes("12Xi"), None);
        assert_eq!(parse_bytes("99999999999999999999"), None);
        assert_eq!(parse_bytes("20000000Ti"), None);
    }
}
