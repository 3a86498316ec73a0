//! Tolerant number parsing and column-aware number rendering.
//!
//! Every numeric field that reaches the monitor as text (settings values, CSV cells, edited
//! filter bounds) passes through [`parse_number`]. Rendering goes through [`format_value`] so
//! that anything displayed can be parsed back to the same displayed magnitude.

use serde::{Deserialize, Serialize};

/// Typographic minus signs normalised to ASCII `-` before parsing.
const MINUS_VARIANTS: [char; 6] = [
    '\u{2212}', // minus sign
    '\u{2012}', // figure dash
    '\u{2013}', // en dash
    '\u{2014}', // em dash
    '\u{FE63}', // small hyphen-minus
    '\u{FF0D}', // fullwidth hyphen-minus
];

const CURRENCY_GLYPHS: [char; 3] = ['€', '$', '£'];

/// Minus sign used when rendering signed monetary values.
pub const MINUS: char = '\u{2212}';

/// Parse human-formatted numeric text into an `f64`.
///
/// Accepts grouping commas, currency glyphs, a trailing `%` (value kept in written units),
/// accounting parentheses and unicode minus variants. Returns `None` for empty or
/// non-numeric input and for non-finite results.
///
/// ```
/// use latency_monitor::numeric::parse_number;
///
/// assert_eq!(parse_number("(1,234.5 €)"), Some(-1234.5));
/// assert_eq!(parse_number("53%"), Some(53.0));
/// assert_eq!(parse_number("abc"), None);
/// ```
pub fn parse_number(text: &str) -> Option<f64> {
    let mut cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{200B}')
        .map(|c| if MINUS_VARIANTS.contains(&c) { '-' } else { c })
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let negative_parens = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative_parens {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    cleaned.retain(|c| !CURRENCY_GLYPHS.contains(&c) && c != ',');
    if let Some(stripped) = cleaned.strip_suffix('%') {
        cleaned = stripped.to_string();
    }

    let value = cleaned.parse::<f64>().ok().filter(|value| value.is_finite())?;

    Some(if negative_parens { -value.abs() } else { value })
}

/// Parse text as a whole number, accepting the same decorations as [`parse_number`].
///
/// Values with a fractional part are rejected.
pub fn parse_int(text: &str) -> Option<i64> {
    if let Ok(value) = text.trim().parse::<i64>() {
        return Some(value);
    }

    parse_number(text)
        .filter(|value| value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .map(|value| value as i64)
}

/// Rendering rule for a numeric column.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ColumnKind {
    /// Percentage, one decimal. Values in `[0, 1]` are treated as fractions and scaled ×100.
    Percent,
    /// Monetary / PnL, always signed, grouped, one decimal.
    Money,
    /// Grouped whole number, sign only when negative.
    Integer,
    /// Grouped, one decimal, sign only when negative.
    Float,
}

/// Render a value for display according to its [`ColumnKind`].
pub fn format_value(value: f64, kind: ColumnKind) -> String {
    match kind {
        ColumnKind::Percent => {
            let scaled = if (0.0..=1.0).contains(&value) {
                value * 100.0
            } else {
                value
            };
            format!("{}%", format_decimal(scaled, '-'))
        }
        ColumnKind::Money => {
            let body = group_decimal(value.abs());
            if body == "0.0" {
                body
            } else if value > 0.0 {
                format!("+{body}")
            } else {
                format!("{MINUS}{body}")
            }
        }
        ColumnKind::Integer => {
            let rounded = value.round();
            let body = group_digits(&format!("{:.0}", rounded.abs()));
            if rounded < 0.0 {
                format!("-{body}")
            } else {
                body
            }
        }
        ColumnKind::Float => format_decimal(value, '-'),
    }
}

/// Render a whole-number count with an explicit sign, `zero` when it rounds to nothing.
///
/// Used by the summary triplets (`12 | +8 | −4`).
pub fn signed_text(value: f64, zero: &str) -> String {
    let rounded = value.round();
    if rounded > 0.0 {
        format!("+{}", group_digits(&format!("{rounded:.0}")))
    } else if rounded < 0.0 {
        format!("{MINUS}{}", group_digits(&format!("{:.0}", rounded.abs())))
    } else {
        zero.to_string()
    }
}

fn format_decimal(value: f64, minus: char) -> String {
    let body = group_decimal(value.abs());
    if value < 0.0 && body != "0.0" {
        format!("{minus}{body}")
    } else {
        body
    }
}

/// Group a non-negative value with thousands separators at one decimal place.
fn group_decimal(magnitude: f64) -> String {
    let fixed = format!("{magnitude:.1}");
    match fixed.split_once('.') {
        Some((whole, fraction)) => format!("{}.{}", group_digits(whole), fraction),
        None => group_digits(&fixed),
    }
}

/// Insert `,` every three digits from the right of an unsigned digit string.
fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (len - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
