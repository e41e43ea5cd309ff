//! Value formatting for report output
//!
//! Sample values carry a unit (`nanoseconds`, `bytes`, `count`, ...). These
//! helpers scale a raw value to a readable unit and format percentages the
//! way the report legend and tables show them.

const TIME_UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("mins", 60e9),
    ("hrs", 3600e9),
];

const MEMORY_UNITS: &[(&str, f64)] = &[
    ("B", 1.0),
    ("kB", 1024.0),
    ("MB", 1024.0 * 1024.0),
    ("GB", 1024.0 * 1024.0 * 1024.0),
    ("TB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("PB", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
];

fn base_unit(unit: &str) -> Option<(&'static [(&'static str, f64)], f64)> {
    let unit = unit.to_lowercase();
    let factor = match unit.as_str() {
        "nanoseconds" | "nanosecond" | "ns" => return Some((TIME_UNITS, 1.0)),
        "microseconds" | "microsecond" | "us" => 1e3,
        "milliseconds" | "millisecond" | "ms" => 1e6,
        "seconds" | "second" | "s" => 1e9,
        "bytes" | "byte" | "b" => return Some((MEMORY_UNITS, 1.0)),
        "kilobytes" | "kb" => return Some((MEMORY_UNITS, 1024.0)),
        "megabytes" | "mb" => return Some((MEMORY_UNITS, 1024.0 * 1024.0)),
        _ => return None,
    };
    Some((TIME_UNITS, factor))
}

/// Scale `value` expressed in `unit` to the largest unit that keeps the
/// magnitude at or above one.
///
/// Counts and unknown units are returned unscaled; `count` maps to an empty
/// unit suffix.
pub fn scale(value: i64, unit: &str) -> (f64, String) {
    let Some((units, factor)) = base_unit(unit) else {
        let suffix = match unit {
            "count" | "" => String::new(),
            other => other.to_string(),
        };
        return (value as f64, suffix);
    };

    let base = value as f64 * factor;
    let magnitude = base.abs();
    let mut chosen = units[0];
    for &candidate in units {
        if magnitude >= candidate.1 {
            chosen = candidate;
        }
    }
    (base / chosen.1, chosen.0.to_string())
}

/// Scale and format a value, e.g. `1.50ms`, `10MB` or `42`.
pub fn scaled_label(value: i64, unit: &str) -> String {
    let (v, u) = scale(value, unit);
    let formatted = format!("{:.2}", v);
    let formatted = formatted
        .strip_suffix(".00")
        .map(str::to_string)
        .unwrap_or(formatted);
    if formatted == "0" || formatted == "-0" {
        return "0".to_string();
    }
    format!("{}{}", formatted, u)
}

/// Percentage of `value` relative to `total`, padded to a fixed width.
///
/// Values at or above one percent show two decimals; smaller values show two
/// significant digits. A zero total yields `0%`.
pub fn percentage(value: i64, total: i64) -> String {
    let ratio = if total != 0 {
        (value as f64 / total as f64).abs() * 100.0
    } else {
        0.0
    };
    if (99.95..=100.05).contains(&ratio) {
        "  100%".to_string()
    } else if ratio >= 1.0 {
        format!("{:5.2}%", ratio)
    } else {
        format!("{:>5}%", two_significant_digits(ratio))
    }
}

fn two_significant_digits(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if x < 1e-4 {
        let formatted = format!("{:.1e}", x);
        return formatted.replace(".0e", "e");
    }
    let exponent = x.log10().floor() as i32;
    let decimals = (1 - exponent).max(0) as usize;
    let formatted = format!("{:.*}", decimals, x);
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_label_time() {
        assert_eq!(scaled_label(1_500_000, "nanoseconds"), "1.50ms");
        assert_eq!(scaled_label(10_000_000, "nanoseconds"), "10ms");
        assert_eq!(scaled_label(2_000_000_000, "nanoseconds"), "2s");
        assert_eq!(scaled_label(999, "nanoseconds"), "999ns");
        assert_eq!(scaled_label(3, "seconds"), "3s");
        assert_eq!(scaled_label(0, "nanoseconds"), "0");
    }

    #[test]
    fn test_scaled_label_negative() {
        assert_eq!(scaled_label(-1_500_000, "nanoseconds"), "-1.50ms");
    }

    #[test]
    fn test_scaled_label_memory() {
        assert_eq!(scaled_label(512, "bytes"), "512B");
        assert_eq!(scaled_label(2048, "bytes"), "2kB");
        assert_eq!(scaled_label(3 * 1024 * 1024 / 2, "bytes"), "1.50MB");
    }

    #[test]
    fn test_scaled_label_count_and_unknown() {
        assert_eq!(scaled_label(42, "count"), "42");
        assert_eq!(scaled_label(7, "widgets"), "7widgets");
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 1), "  100%");
        assert_eq!(percentage(1, 3), "33.33%");
        assert_eq!(percentage(5, 1000), "  0.5%");
        assert_eq!(percentage(123, 100_000), " 0.12%");
        assert_eq!(percentage(0, 10), "    0%");
        assert_eq!(percentage(1, 0), "    0%");
        assert_eq!(percentage(-1, 4), "25.00%");
    }

    #[test]
    fn test_percentage_trims_cleanly() {
        assert_eq!(percentage(2, 3).trim(), "66.67%");
        assert_eq!(percentage(5, 1000).trim(), "0.5%");
    }
}
