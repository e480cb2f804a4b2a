/// Byte-count formatting and parsing for reports and command-line input.
///
/// All internal sizes are `u64` bytes. Floating point only appears at the
/// display boundary.

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Format a byte count with a binary-scaled unit (KB = 1024 B).
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", b / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", b / MB as f64)
    } else if bytes < TB {
        format!("{:.2} GB", b / GB as f64)
    } else {
        format!("{:.2} TB", b / TB as f64)
    }
}

/// Format a count with thousand separators.
pub fn format_count(count: u64) -> String {
    let s = count.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Parse a human size such as `"512"`, `"10MB"`, `"1.5 GB"` or `"4k"`.
///
/// Units are binary and case-insensitive; a trailing `B`/`iB` is optional.
pub fn parse_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number.parse().ok()?;

    let unit = unit.trim().to_ascii_lowercase();
    let unit = unit
        .strip_suffix("ib")
        .or_else(|| unit.strip_suffix('b'))
        .unwrap_or(unit.as_str());
    let multiplier = match unit {
        "" => 1,
        "k" => KB,
        "m" => MB,
        "g" => GB,
        "t" => TB,
        _ => return None,
    };
    Some((value * multiplier as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(1_099_511_627_776), "1.00 TB");
    }

    #[test]
    fn format_count_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn parse_size_accepts_common_forms() {
        assert_eq!(parse_size("512"), Some(512));
        assert_eq!(parse_size("4k"), Some(4096));
        assert_eq!(parse_size("10MB"), Some(10 * MB));
        assert_eq!(parse_size("1.5 GiB"), Some(GB + GB / 2));
        assert_eq!(parse_size("2 b"), Some(2));
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("MB"), None);
        assert_eq!(parse_size("10 parsecs"), None);
    }
}
