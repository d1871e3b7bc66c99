//! FILENAME: pivot-view/src/format.rs
//! PURPOSE: Cell value formatting - raw text in, display text + sort key out.
//! CONTEXT: Every leaf cell and header cell passes through here exactly once
//! during parse. A cell's display string and its sort key are derived
//! together but kept separate, so date columns order chronologically and
//! numeric columns order numerically no matter what the format code
//! renders. All functions here are pure.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::definition::{ColumnIndex, TimeGranularity, ViewConfig, SMART_DATE_ID};

/// Fixed textual prefix marking a cell as an encoded point in time.
/// The payload after the colon is a decimal epoch offset in milliseconds.
pub const TIMESTAMP_MARKER: &str = "__timestamp:";

// ============================================================================
// SORT KEYS
// ============================================================================

/// A value used purely for ordering comparisons, never for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortKey {
    /// Empty/whitespace-only cell. Orders below every real value.
    Empty,
    /// Numeric content, including decoded timestamp epochs.
    Number(f64),
    /// Anything else, compared lexically. Orders above all numbers.
    Text(String),
}

impl SortKey {
    /// Total ordering over sort keys. NaN numbers compare equal so the
    /// comparator stays consistent for the stable sort.
    pub fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Empty, SortKey::Empty) => Ordering::Equal,
            (SortKey::Empty, _) => Ordering::Less,
            (_, SortKey::Empty) => Ordering::Greater,

            (SortKey::Number(a), SortKey::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SortKey::Number(_), _) => Ordering::Less,
            (_, SortKey::Number(_)) => Ordering::Greater,

            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
        }
    }
}

/// The result of formatting one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedCell {
    pub display: String,
    pub sort_key: SortKey,
}

// ============================================================================
// TIMESTAMP MARKER
// ============================================================================

/// Decodes the timestamp marker convention: the fixed prefix followed by
/// an optionally signed, optionally fractional decimal number.
///
/// Returns the epoch payload in milliseconds, or `None` when the text is
/// not a marker. Degenerate payloads ("", "-", ".") decode to epoch 0,
/// matching the upstream string-to-number coercion.
pub fn parse_timestamp_marker(text: &str) -> Option<f64> {
    let payload = text.strip_prefix(TIMESTAMP_MARKER)?;
    let digits = payload.strip_prefix('-').unwrap_or(payload);
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return None,
        }
    }
    Some(payload.parse::<f64>().unwrap_or(0.0))
}

// ============================================================================
// DATE FORMATTING
// ============================================================================

/// The date formatting strategy, resolved once per render from the
/// configured format id and granularity.
#[derive(Debug, Clone, PartialEq)]
pub enum DateFormatter {
    /// Granularity-keyed formatter: each grain has its natural pattern.
    Smart(TimeGranularity),
    /// Explicit strftime-style pattern.
    Pattern(String),
    /// No formatter configured: the epoch renders as its number.
    Identity,
}

impl DateFormatter {
    pub fn resolve(date_format: Option<&str>, granularity: Option<TimeGranularity>) -> Self {
        match (date_format, granularity) {
            (Some(id), Some(g)) if id == SMART_DATE_ID => DateFormatter::Smart(g),
            // The smart id without a declared grain falls back to the
            // full datetime pattern.
            (Some(id), None) if id == SMART_DATE_ID => {
                DateFormatter::Pattern("%Y-%m-%d %H:%M:%S".to_string())
            }
            (Some(fmt), _) => DateFormatter::Pattern(fmt.to_string()),
            (None, _) => DateFormatter::Identity,
        }
    }

    /// Formats an epoch-milliseconds value for display.
    pub fn format(&self, epoch_ms: f64) -> String {
        if !epoch_ms.is_finite() {
            return epoch_ms.to_string();
        }
        match self {
            DateFormatter::Smart(TimeGranularity::Quarter) => {
                let (year, month, ..) = broken_down(epoch_ms);
                format!("{:04} Q{}", year, (month - 1) / 3 + 1)
            }
            DateFormatter::Smart(g) => format_pattern(granularity_pattern(*g), epoch_ms),
            DateFormatter::Pattern(p) => format_pattern(p, epoch_ms),
            DateFormatter::Identity => {
                if epoch_ms.fract() == 0.0 {
                    format!("{:.0}", epoch_ms)
                } else {
                    epoch_ms.to_string()
                }
            }
        }
    }
}

fn granularity_pattern(g: TimeGranularity) -> &'static str {
    match g {
        TimeGranularity::Second => "%Y-%m-%d %H:%M:%S",
        TimeGranularity::Minute => "%Y-%m-%d %H:%M",
        TimeGranularity::Hour => "%Y-%m-%d %H:00",
        TimeGranularity::Day | TimeGranularity::Week => "%Y-%m-%d",
        TimeGranularity::Month => "%Y-%m",
        // Quarter is rendered specially; this is a fallback only.
        TimeGranularity::Quarter => "%Y-%m",
        TimeGranularity::Year => "%Y",
    }
}

/// Formats an epoch-ms value through a strftime subset:
/// `%Y %m %d %H %M %S %%`; any other byte passes through literally.
fn format_pattern(pattern: &str, epoch_ms: f64) -> String {
    let (year, month, day, hour, minute, second) = broken_down(epoch_ms);
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&format!("{:04}", year)),
            Some('m') => out.push_str(&format!("{:02}", month)),
            Some('d') => out.push_str(&format!("{:02}", day)),
            Some('H') => out.push_str(&format!("{:02}", hour)),
            Some('M') => out.push_str(&format!("{:02}", minute)),
            Some('S') => out.push_str(&format!("{:02}", second)),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Breaks an epoch-ms value into UTC (year, month, day, hour, minute,
/// second). Sub-second precision is floored away.
fn broken_down(epoch_ms: f64) -> (i32, u32, u32, u32, u32, u32) {
    let secs = (epoch_ms / 1000.0).floor() as i64;
    let days = secs.div_euclid(86_400);
    let tod = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    (
        year,
        month,
        day,
        (tod / 3600) as u32,
        ((tod % 3600) / 60) as u32,
        (tod % 60) as u32,
    )
}

/// Days-since-epoch to proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}

// ============================================================================
// NUMBER FORMAT CODES
// ============================================================================

/// Rendering kind of a parsed number format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// No type character: auto-detect the best representation.
    General,
    /// `f`: fixed decimal places.
    Fixed,
    /// `d`: rounded integer.
    Integer,
    /// `%`: multiplied by 100 with a percent sign.
    Percent,
    /// `s`: significant digits with an SI prefix.
    Si,
    /// `e`: exponent notation.
    Exponent,
}

/// A parsed number format code in the upstream d3-format style, e.g.
/// `",.2f"`, `".3s"`, `",d"`, `".1%"`, `"$,.2f"`.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberFormatSpec {
    pub currency: bool,
    pub grouping: bool,
    pub precision: Option<usize>,
    pub kind: FormatKind,
}

impl NumberFormatSpec {
    /// Parses a format code. Unrecognized characters are skipped, so an
    /// unknown code degrades to general formatting rather than failing
    /// (format codes come from a trusted config and must always render).
    pub fn parse(code: &str) -> Self {
        let mut spec = NumberFormatSpec {
            currency: false,
            grouping: false,
            precision: None,
            kind: FormatKind::General,
        };
        let mut chars = code.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '$' => spec.currency = true,
                ',' => spec.grouping = true,
                '.' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                        digits.push(*d);
                        chars.next();
                    }
                    spec.precision = digits.parse().ok();
                }
                'f' => spec.kind = FormatKind::Fixed,
                'd' => spec.kind = FormatKind::Integer,
                '%' => spec.kind = FormatKind::Percent,
                's' => spec.kind = FormatKind::Si,
                'e' => spec.kind = FormatKind::Exponent,
                _ => {}
            }
        }
        spec
    }
}

/// Formats a number according to a parsed format code.
pub fn format_number(value: f64, spec: &NumberFormatSpec) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let magnitude = if spec.currency { value.abs() } else { value };
    let body = match spec.kind {
        FormatKind::General => format_general(magnitude),
        FormatKind::Fixed => {
            format_decimal(magnitude, spec.precision.unwrap_or(6), spec.grouping)
        }
        FormatKind::Integer => format_decimal(magnitude.round(), 0, spec.grouping),
        FormatKind::Percent => format!(
            "{}%",
            format_decimal(magnitude * 100.0, spec.precision.unwrap_or(0), spec.grouping)
        ),
        FormatKind::Si => format_si(magnitude, spec.precision.unwrap_or(3)),
        FormatKind::Exponent => {
            format!("{:.*e}", spec.precision.unwrap_or(6), magnitude)
        }
    };
    if spec.currency {
        if value < 0.0 {
            format!("-${}", body)
        } else {
            format!("${}", body)
        }
    } else {
        body
    }
}

/// Format a number in general format (auto-detect best representation).
fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let abs_value = value.abs();

    // Use scientific notation for very large or very small numbers
    if abs_value >= 1e10 || abs_value < 1e-4 {
        return format!("{:.5e}", value);
    }

    // For integers, don't show decimal point
    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }

    // For decimals, show up to 10 digits but trim trailing zeros
    let formatted = format!("{:.10}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Format a number with fixed decimal places and optional grouping.
fn format_decimal(value: f64, decimal_places: usize, grouping: bool) -> String {
    let rounded = format!("{:.prec$}", value, prec = decimal_places);
    if grouping {
        add_thousands_separator(&rounded)
    } else {
        rounded
    }
}

/// Add thousands separators to a numeric string.
fn add_thousands_separator(s: &str) -> String {
    let mut parts = s.splitn(2, '.');
    let integer_part = parts.next().unwrap_or("");
    let decimal_part = parts.next();

    let negative = integer_part.starts_with('-');
    let digits: String = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut result = String::new();
    let len = digits.len();

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    if negative {
        result = format!("-{}", result);
    }

    if let Some(decimal) = decimal_part {
        result.push('.');
        result.push_str(decimal);
    }

    result
}

/// Format a number to `sig` significant digits with an SI prefix.
fn format_si(value: f64, sig: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let negative = value < 0.0;
    let abs = value.abs();

    let exp = abs.log10().floor() as i32;
    let mut e3 = (exp.div_euclid(3) * 3).clamp(-24, 24);
    let mut scaled = abs / 10f64.powi(e3);
    let mut int_digits = (exp - e3) as usize + 1;

    // Rounding at the precision boundary can carry into the next
    // prefix (999.9k -> 1.00M).
    let decimals = sig.saturating_sub(int_digits);
    if format!("{:.*}", decimals, scaled).parse::<f64>().unwrap_or(scaled) >= 1000.0 && e3 < 24 {
        scaled /= 1000.0;
        e3 += 3;
        int_digits = 1;
    }

    let decimals = sig.saturating_sub(int_digits);
    let body = format!("{:.*}{}", decimals, scaled, si_prefix(e3));
    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

fn si_prefix(e3: i32) -> &'static str {
    match e3 {
        -24 => "y",
        -21 => "z",
        -18 => "a",
        -15 => "f",
        -12 => "p",
        -9 => "n",
        -6 => "µ",
        -3 => "m",
        3 => "k",
        6 => "M",
        9 => "G",
        12 => "T",
        15 => "P",
        18 => "E",
        21 => "Z",
        24 => "Y",
        _ => "",
    }
}

// ============================================================================
// CELL FORMATTER
// ============================================================================

/// Per-render formatter for leaf cells and header/label cells.
///
/// Column format codes and the date strategy are resolved once at
/// construction; every `format_*` call after that is pure.
#[derive(Debug, Clone)]
pub struct CellFormatter {
    column_formats: Vec<NumberFormatSpec>,
    default_format: NumberFormatSpec,
    date_formatter: DateFormatter,
    verbose_map: HashMap<String, String>,
}

impl CellFormatter {
    pub fn new(config: &ViewConfig) -> Self {
        let default_format = NumberFormatSpec::parse(&config.number_format);
        let column_formats = config
            .columns
            .iter()
            .map(|col| match config.column_formats.get(col.name()) {
                Some(code) => NumberFormatSpec::parse(code),
                None => default_format.clone(),
            })
            .collect();

        CellFormatter {
            column_formats,
            default_format,
            date_formatter: DateFormatter::resolve(
                config.date_format.as_deref(),
                config.granularity,
            ),
            verbose_map: config.verbose_map.clone(),
        }
    }

    /// Formats a value cell: timestamp markers become dates keyed on the
    /// raw epoch, numeric text gets the column's number format keyed on
    /// the parsed value, empty text gets the low sentinel key, anything
    /// else passes through.
    pub fn format_value(&self, column: ColumnIndex, raw: &str) -> FormattedCell {
        let trimmed = raw.trim();

        if let Some(epoch_ms) = parse_timestamp_marker(trimmed) {
            return FormattedCell {
                display: self.date_formatter.format(epoch_ms),
                sort_key: SortKey::Number(epoch_ms),
            };
        }

        if trimmed.is_empty() {
            return FormattedCell {
                display: String::new(),
                sort_key: SortKey::Empty,
            };
        }

        if let Ok(n) = trimmed.parse::<f64>() {
            let spec = self
                .column_formats
                .get(column)
                .unwrap_or(&self.default_format);
            return FormattedCell {
                display: format_number(n, spec),
                sort_key: SortKey::Number(n),
            };
        }

        FormattedCell {
            display: raw.to_string(),
            sort_key: SortKey::Text(raw.to_string()),
        }
    }

    /// Formats a header or row-label cell: timestamp markers become
    /// dates, known identifiers get their verbose label, anything else
    /// passes through.
    pub fn format_label(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if let Some(epoch_ms) = parse_timestamp_marker(trimmed) {
            return self.date_formatter.format(epoch_ms);
        }
        if let Some(verbose) = self.verbose_map.get(trimmed) {
            return verbose.clone();
        }
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ColumnSpec;

    fn config_with(columns: Vec<&str>) -> ViewConfig {
        ViewConfig::new(columns.into_iter().map(ColumnSpec::from).collect())
    }

    #[test]
    fn test_timestamp_marker_parsing() {
        assert_eq!(parse_timestamp_marker("__timestamp:1700000000"), Some(1.7e9));
        assert_eq!(parse_timestamp_marker("__timestamp:-86400000"), Some(-86400000.0));
        assert_eq!(parse_timestamp_marker("__timestamp:1.5"), Some(1.5));
        assert_eq!(parse_timestamp_marker("__timestamp:"), Some(0.0));
        assert_eq!(parse_timestamp_marker("__timestamp:12abc"), None);
        assert_eq!(parse_timestamp_marker("plain text"), None);
    }

    #[test]
    fn test_broken_down_epoch() {
        assert_eq!(broken_down(0.0), (1970, 1, 1, 0, 0, 0));
        assert_eq!(broken_down(1_700_000_000_000.0), (2023, 11, 14, 22, 13, 20));
        // One day before the epoch.
        assert_eq!(broken_down(-86_400_000.0), (1969, 12, 31, 0, 0, 0));
    }

    #[test]
    fn test_pattern_formatting() {
        let f = DateFormatter::Pattern("%Y-%m-%d %H:%M:%S".to_string());
        assert_eq!(f.format(1_700_000_000_000.0), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_smart_formatter_per_granularity() {
        let ms = 1_700_000_000_000.0;
        assert_eq!(DateFormatter::Smart(TimeGranularity::Day).format(ms), "2023-11-14");
        assert_eq!(DateFormatter::Smart(TimeGranularity::Month).format(ms), "2023-11");
        assert_eq!(DateFormatter::Smart(TimeGranularity::Quarter).format(ms), "2023 Q4");
        assert_eq!(DateFormatter::Smart(TimeGranularity::Year).format(ms), "2023");
    }

    #[test]
    fn test_formatter_resolution() {
        assert_eq!(
            DateFormatter::resolve(Some("smart_date"), Some(TimeGranularity::Day)),
            DateFormatter::Smart(TimeGranularity::Day)
        );
        assert_eq!(
            DateFormatter::resolve(Some("%Y"), Some(TimeGranularity::Day)),
            DateFormatter::Pattern("%Y".to_string())
        );
        assert_eq!(DateFormatter::resolve(None, None), DateFormatter::Identity);
    }

    #[test]
    fn test_number_format_codes() {
        assert_eq!(format_number(1234.567, &NumberFormatSpec::parse(",.2f")), "1,234.57");
        assert_eq!(format_number(1234.0, &NumberFormatSpec::parse(".3s")), "1.23k");
        assert_eq!(format_number(0.1234, &NumberFormatSpec::parse(".1%")), "12.3%");
        assert_eq!(format_number(1234.4, &NumberFormatSpec::parse(",d")), "1,234");
        assert_eq!(format_number(1234.5, &NumberFormatSpec::parse("$,.2f")), "$1,234.50");
        assert_eq!(format_number(-1234.5, &NumberFormatSpec::parse("$,.2f")), "-$1,234.50");
    }

    #[test]
    fn test_si_carry_at_prefix_boundary() {
        assert_eq!(format_si(999_999.0, 3), "1.00M");
        assert_eq!(format_si(0.0015, 2), "1.5m");
        assert_eq!(format_si(0.0, 3), "0");
    }

    #[test]
    fn test_sort_key_ordering() {
        let empty = SortKey::Empty;
        let low = SortKey::Number(-5.0);
        let high = SortKey::Number(10.0);
        let text = SortKey::Text("abc".to_string());

        assert_eq!(empty.compare(&low), Ordering::Less);
        assert_eq!(low.compare(&high), Ordering::Less);
        assert_eq!(high.compare(&text), Ordering::Less);
        assert_eq!(empty.compare(&empty), Ordering::Equal);
    }

    #[test]
    fn test_format_value_timestamp_keeps_numeric_key() {
        let mut config = config_with(vec!["__timestamp", "sales"]);
        config.date_format = Some(SMART_DATE_ID.to_string());
        config.granularity = Some(TimeGranularity::Day);
        let formatter = CellFormatter::new(&config);

        let cell = formatter.format_value(0, "__timestamp:1700000000");
        // Display is a human date; ordering stays on the raw epoch.
        assert_eq!(cell.sort_key, SortKey::Number(1_700_000_000.0));
        assert_eq!(cell.display, "1970-01-20");
    }

    #[test]
    fn test_format_value_numeric_and_empty() {
        let mut config = config_with(vec!["sales"]);
        config.column_formats.insert("sales".to_string(), ",.2f".to_string());
        let formatter = CellFormatter::new(&config);

        let n = formatter.format_value(0, "1234.5");
        assert_eq!(n.display, "1,234.50");
        assert_eq!(n.sort_key, SortKey::Number(1234.5));

        let empty = formatter.format_value(0, "   ");
        assert_eq!(empty.display, "");
        assert_eq!(empty.sort_key, SortKey::Empty);

        let text = formatter.format_value(0, "n/a");
        assert_eq!(text.display, "n/a");
        assert_eq!(text.sort_key, SortKey::Text("n/a".to_string()));
    }

    #[test]
    fn test_format_label_verbose_map() {
        let mut config = config_with(vec!["sum__sales"]);
        config
            .verbose_map
            .insert("sum__sales".to_string(), "Total Sales".to_string());
        let formatter = CellFormatter::new(&config);

        assert_eq!(formatter.format_label("sum__sales"), "Total Sales");
        assert_eq!(formatter.format_label("region"), "region");
    }
}
