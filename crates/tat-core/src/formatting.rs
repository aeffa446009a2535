/// Label for a duration or score that cannot be computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Label for a statistics cell when the batch held no valid samples at all.
pub const NO_DATA: &str = "No Data";

/// Format a whole number of minutes as a TAT label.
///
/// * `0` → `"N/A"` (zero means "not computable", never "instant")
/// * `< 60` → `"45m"`
/// * `≥ 60` → `"3h "` with the minutes appended only when non-zero, e.g. `"2h 5m"`
///
/// # Examples
///
/// ```
/// use tat_core::formatting::format_duration;
///
/// assert_eq!(format_duration(0),   "N/A");
/// assert_eq!(format_duration(59),  "59m");
/// assert_eq!(format_duration(60),  "1h ");
/// assert_eq!(format_duration(125), "2h 5m");
/// ```
pub fn format_duration(minutes: u64) -> String {
    if minutes == 0 {
        return NOT_AVAILABLE.to_string();
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 {
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h ", hours)
        }
    } else {
        format!("{}m", mins)
    }
}

/// Format an averaged minute count, rounding to the nearest whole minute.
///
/// Negative and non-finite inputs are treated as not computable.
pub fn format_average(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return NOT_AVAILABLE.to_string();
    }
    format_duration(minutes.round() as u64)
}

/// Format a TATx percentage with one decimal, or `"N/A"` for the `0` sentinel.
///
/// Ties round away from zero.
///
/// # Examples
///
/// ```
/// use tat_core::formatting::format_score;
///
/// assert_eq!(format_score(104.25), "104.3%");
/// assert_eq!(format_score(0.0), "N/A");
/// ```
pub fn format_score(score: f64) -> String {
    if !score.is_finite() || score <= 0.0 {
        return NOT_AVAILABLE.to_string();
    }
    format!("{:.1}%", (score * 10.0).round() / 10.0)
}

/// Format an integer count with thousands separators.
///
/// # Examples
///
/// ```
/// use tat_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
