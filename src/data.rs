//! Cell-level parsing helpers shared by inference and statistics.

/// Tokens that represent a missing value rather than data. Treated as nulls
/// by both the schema inferencer and the statistics computer.
pub fn is_placeholder(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    let stripped = lowered.trim_start_matches('#');
    matches!(
        stripped,
        "na" | "n/a" | "n.a." | "null" | "none" | "nan" | "missing"
    ) || (!stripped.is_empty() && stripped.chars().all(|c| c == '-'))
}

/// Returns the trimmed cell content, or `None` for empty and placeholder cells.
pub fn normalize_cell(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || is_placeholder(trimmed) {
        None
    } else {
        Some(trimmed)
    }
}

/// Parses a numeric token, tolerating thousands separators. Returns `None`
/// for anything that is not a finite number.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '_'))
        .collect();
    if cleaned.is_empty() || cleaned == "+" || cleaned == "-" {
        return None;
    }
    // `f64::from_str` accepts "inf"/"nan"; those read as text here.
    if cleaned
        .chars()
        .any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E'))
    {
        return None;
    }
    let parsed: f64 = cleaned.parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Renders a metric without trailing noise: integers print bare, everything
/// else keeps four decimal places.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}
