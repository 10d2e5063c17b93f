use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    static ref MANTISSA_PATTERN: Regex = Regex::new(
        r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$"
    ).unwrap();

    static ref LEADING_NUMBER: Regex = Regex::new(
        r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?"
    ).unwrap();
}

/// Magnitude suffixes, longest first so `meg` wins over `m` and `g`.
const SUFFIXES: &[(&str, f64)] = &[
    ("meg", 1e6),
    ("t", 1e12),
    ("g", 1e9),
    ("k", 1e3),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
];

/// Suffixes used when rendering, largest scale first.
const SCALES: &[(f64, &str)] = &[
    (1e12, "T"),
    (1e9, "G"),
    (1e6, "meg"),
    (1e3, "k"),
    (1.0, ""),
    (1e-3, "m"),
    (1e-6, "u"),
    (1e-9, "n"),
    (1e-12, "p"),
];

const SIGNIFICANT_DIGITS: usize = 12;

/// Parse an engineering-notation literal such as `4.7k`, `1Meg` or `-2.5e-3u`.
pub fn parse_value(literal: &str) -> Result<f64> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return Err(parse_error(literal, "empty literal"));
    }

    let lowered = trimmed.to_lowercase();
    let (mantissa, multiplier) = SUFFIXES
        .iter()
        .find_map(|&(suffix, scale)| lowered.strip_suffix(suffix).map(|m| (m, scale)))
        .unwrap_or((lowered.as_str(), 1.0));

    if !MANTISSA_PATTERN.is_match(mantissa) {
        return Err(match LEADING_NUMBER.find(&lowered) {
            Some(number) if number.end() > 0 => {
                parse_error(literal, format!("unknown suffix '{}'", &trimmed[number.end()..]))
            }
            _ => parse_error(literal, "mantissa is not a number"),
        });
    }

    let number: f64 = mantissa
        .parse()
        .map_err(|e| parse_error(literal, format!("{e}")))?;
    let value = number * multiplier;
    if !value.is_finite() {
        return Err(parse_error(literal, "value out of range"));
    }
    Ok(value)
}

/// Render a value with the suffix that keeps its mantissa in `[1, 1000)`.
///
/// Magnitudes outside `[1e-12, 1e15)` fall back to scientific notation. The
/// output always parses back through [`parse_value`].
pub fn format_value(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let magnitude = value.abs();
    if !(1e-12..1e15).contains(&magnitude) {
        return format!("{value:e}");
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let index = SCALES
        .iter()
        .position(|(scale, _)| magnitude >= *scale)
        .unwrap_or(SCALES.len() - 1);

    let (scale, suffix) = SCALES[index];
    let mut mantissa = round_significant(magnitude / scale);
    let mut suffix = suffix;
    // 999.9999999999999u rounds up to 1000u; render it as 1m instead.
    if mantissa >= 1000.0 && index > 0 {
        mantissa /= 1000.0;
        suffix = SCALES[index - 1].1;
    }

    format!("{sign}{}{suffix}", trim_decimal(mantissa))
}

fn round_significant(mantissa: f64) -> f64 {
    let text = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, mantissa);
    text.parse().unwrap_or(mantissa)
}

fn trim_decimal(mantissa: f64) -> String {
    let int_digits = (mantissa.log10().floor() as i32 + 1).max(1) as usize;
    let decimals = SIGNIFICANT_DIGITS.saturating_sub(int_digits);
    let text = format!("{mantissa:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

fn parse_error(literal: &str, reason: impl Into<String>) -> Error {
    Error::Parse {
        literal: literal.to_string(),
        reason: reason.into(),
    }
}

/// Anything the circuit builder accepts as a component value.
pub trait IntoValue {
    fn into_value(self) -> Result<f64>;
}

impl IntoValue for f64 {
    fn into_value(self) -> Result<f64> {
        Ok(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Result<f64> {
        Ok(self as f64)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Result<f64> {
        Ok(self as f64)
    }
}

impl IntoValue for u32 {
    fn into_value(self) -> Result<f64> {
        Ok(self as f64)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Result<f64> {
        parse_value(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Result<f64> {
        parse_value(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Result<f64> {
        parse_value(&self)
    }
}

/// An optional quantity such as a transient step.
///
/// Implemented for `Option<f64>` so `None` needs no annotation, and for the
/// bare value types so a step can be written as `"1u"`.
pub trait IntoOptionalValue {
    fn into_optional_value(self) -> Result<Option<f64>>;
}

impl IntoOptionalValue for Option<f64> {
    fn into_optional_value(self) -> Result<Option<f64>> {
        Ok(self)
    }
}

impl IntoOptionalValue for f64 {
    fn into_optional_value(self) -> Result<Option<f64>> {
        Ok(Some(self))
    }
}

impl IntoOptionalValue for &str {
    fn into_optional_value(self) -> Result<Option<f64>> {
        parse_value(self).map(Some)
    }
}

impl IntoOptionalValue for String {
    fn into_optional_value(self) -> Result<Option<f64>> {
        parse_value(&self).map(Some)
    }
}
