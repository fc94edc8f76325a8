//! Field coercion from loosely-typed API values to column types
//!
//! The remote API returns flat JSON objects whose scalars are mostly strings
//! (`"12"`, `"true"`, `"01/09/2021"`). These helpers turn them into the typed
//! values bound into INSERT statements. All of them are total: a value that
//! cannot be coerced becomes NULL, the default, or `false`, never an error.

use chrono::NaiveDate;
use serde_json::Value;

/// Date format used by every date field of the API
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a `DD/MM/YYYY` string.
///
/// Returns `None` for a missing value, a non-string value, an empty string,
/// or anything that is not a valid calendar date in that format. Day and
/// month take one or two digits, the year exactly four.
pub fn parse_date(value: Option<&Value>) -> Option<NaiveDate> {
    match value {
        Some(Value::String(s)) if has_date_shape(s) => {
            NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
        },
        _ => None,
    }
}

// chrono's `%Y` takes any number of year digits and skips leading spaces
fn has_date_shape(s: &str) -> bool {
    let parts: Vec<&str> = s.split('/').collect();
    let digits = |part: &str, min: usize, max: usize| {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    };

    match parts.as_slice() {
        [day, month, year] => digits(*day, 1, 2) && digits(*month, 1, 2) && digits(*year, 4, 4),
        _ => false,
    }
}

/// Parse an `INTEGER` column value, falling back to `default`.
///
/// Integral strings (surrounding whitespace allowed), JSON integers, floats
/// (truncated toward zero) and booleans (`1`/`0`) are accepted. Anything
/// else, including values outside the `i32` range, yields `default`.
pub fn to_int(value: Option<&Value>, default: i32) -> i32 {
    match value {
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or(default),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).unwrap_or(default)
            } else {
                n.as_f64()
                    .map(f64::trunc)
                    .filter(|f| *f >= f64::from(i32::MIN) && *f <= f64::from(i32::MAX))
                    .map_or(default, |f| f as i32)
            }
        },
        Some(Value::Bool(b)) => i32::from(*b),
        _ => default,
    }
}

/// `true` only for a string equal to `"true"` in any letter case.
pub fn to_bool(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if s.eq_ignore_ascii_case("true"))
}

/// Opaque text column value.
///
/// Strings pass through untouched; numbers and booleans are rendered in
/// their JSON textual form; nested arrays/objects are stored as JSON text.
pub fn to_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}
