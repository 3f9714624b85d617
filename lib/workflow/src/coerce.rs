//! Validation and best-effort conversion of values against a data type.
//!
//! `validate` answers whether a value is acceptable as-is (allowing the
//! lenient string forms each type admits). `convert` coerces the value into
//! the canonical representation for the type and then re-validates it, so a
//! successful conversion always satisfies the constraints.

use crate::data_type::DataType;
use crate::error::ConversionError;
use crate::port::PortConstraints;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Number, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};
use tracing::warn;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern")
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:[a-zA-Z0-9-]+\.)*[a-zA-Z0-9-]+(?::\d{1,5})?(?:[/?#][^\s]*)?$")
        .expect("url pattern")
});

/// Compiled port patterns, keyed by source. `None` marks a pattern that
/// failed to compile.
static PATTERNS: LazyLock<RwLock<HashMap<String, Option<Regex>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

const TRUE_WORDS: [&str; 3] = ["true", "yes", "1"];
const FALSE_WORDS: [&str; 3] = ["false", "no", "0"];

impl DataType {
    /// Checks whether `value` is acceptable for this type under `constraints`.
    #[must_use]
    pub fn validate(&self, value: &JsonValue, constraints: &PortConstraints) -> bool {
        match self {
            Self::Any => true,
            Self::String => value
                .as_str()
                .is_some_and(|s| string_constraints_hold(s, constraints)),
            Self::Number => as_number(value).is_some_and(|n| range_holds(n, constraints)),
            Self::Boolean => as_bool(value).is_some(),
            Self::Json => parse_structured(value).is_some(),
            Self::Object => parse_structured(value).is_some_and(|v| v.is_object()),
            Self::Array => match parse_structured(value) {
                Some(JsonValue::Array(items)) => items_hold(&items, constraints),
                _ => false,
            },
            Self::File => file_path(value).is_some_and(|path| extension_allowed(path, constraints))
                || is_stream_like(value),
            Self::Date => parse_date(value).is_some(),
            Self::Email => value.as_str().is_some_and(|s| EMAIL_RE.is_match(s)),
            Self::Url => value.as_str().is_some_and(|s| URL_RE.is_match(s)),
        }
    }

    /// Coerces `value` into this type.
    ///
    /// # Errors
    ///
    /// Returns a `ConversionError` when no coercion exists (for example a
    /// non-numeric string to `number`) or when the coerced value violates the
    /// constraints.
    pub fn convert(
        &self,
        value: &JsonValue,
        constraints: &PortConstraints,
    ) -> Result<JsonValue, ConversionError> {
        let converted = match self {
            Self::Any => return Ok(value.clone()),
            Self::String => JsonValue::String(to_display_string(value).ok_or_else(|| {
                ConversionError::new(*self, "null has no string representation")
            })?),
            Self::Number => to_number(value).ok_or_else(|| {
                ConversionError::new(*self, format!("{} is not numeric", describe(value)))
            })?,
            Self::Boolean => JsonValue::Bool(as_bool(value).ok_or_else(|| {
                ConversionError::new(*self, format!("{} is not a boolean", describe(value)))
            })?),
            Self::Json => parse_structured(value).ok_or_else(|| {
                ConversionError::new(*self, "expected an object, an array, or a string holding one")
            })?,
            Self::Object => match parse_structured(value) {
                Some(obj @ JsonValue::Object(_)) => obj,
                _ => {
                    return Err(ConversionError::new(
                        *self,
                        format!("{} is not an object", describe(value)),
                    ));
                }
            },
            Self::Array => convert_array(value, constraints)?,
            Self::File => match value {
                JsonValue::String(s) => JsonValue::String(s.trim().to_string()),
                other if is_stream_like(other) || file_path(other).is_some() => other.clone(),
                other => {
                    return Err(ConversionError::new(
                        *self,
                        format!("{} is not a path or file handle", describe(other)),
                    ));
                }
            },
            Self::Date => {
                let date = parse_date(value).ok_or_else(|| {
                    ConversionError::new(*self, format!("{} is not a date", describe(value)))
                })?;
                JsonValue::String(date.to_rfc3339())
            }
            Self::Email | Self::Url => match value {
                JsonValue::String(s) => JsonValue::String(s.trim().to_string()),
                other => {
                    return Err(ConversionError::new(
                        *self,
                        format!("{} is not a string", describe(other)),
                    ));
                }
            },
        };

        if self.validate(&converted, constraints) {
            Ok(converted)
        } else {
            Err(ConversionError::new(
                *self,
                "converted value violates the port constraints",
            ))
        }
    }
}

fn describe(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn string_constraints_hold(s: &str, constraints: &PortConstraints) -> bool {
    let len = s.chars().count();
    if constraints.min_length.is_some_and(|min| len < min)
        || constraints.max_length.is_some_and(|max| len > max)
    {
        return false;
    }
    match &constraints.pattern {
        Some(pattern) => pattern_matches(pattern, s),
        None => true,
    }
}

fn pattern_matches(pattern: &str, s: &str) -> bool {
    if let Some(compiled) = PATTERNS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return compiled.as_ref().is_some_and(|re| re.is_match(s));
    }

    let compiled = match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "invalid port pattern; values will not validate");
            None
        }
    };
    let matched = compiled.as_ref().is_some_and(|re| re.is_match(s));
    PATTERNS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pattern.to_string(), compiled);
    matched
}

fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Numbers pass through untouched; numeric strings parse as integers
/// before falling back to floats.
fn to_number(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Number(_) => Some(value.clone()),
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(JsonValue::Number(Number::from(i)));
            }
            if let Ok(u) = s.parse::<u64>() {
                return Some(JsonValue::Number(Number::from(u)));
            }
            s.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .and_then(number_value)
        }
        JsonValue::Bool(b) => Some(JsonValue::Number(Number::from(u8::from(*b)))),
        _ => None,
    }
}

fn number_value(n: f64) -> Option<JsonValue> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(JsonValue::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(JsonValue::Number)
}

fn range_holds(n: f64, constraints: &PortConstraints) -> bool {
    !(constraints.minimum.is_some_and(|min| n < min)
        || constraints.maximum.is_some_and(|max| n > max))
}

fn as_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        JsonValue::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if TRUE_WORDS.contains(&lowered.as_str()) {
                Some(true)
            } else if FALSE_WORDS.contains(&lowered.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Native object/array, or a string that parses as one.
fn parse_structured(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Object(_) | JsonValue::Array(_) => Some(value.clone()),
        JsonValue::String(s) => serde_json::from_str::<JsonValue>(s)
            .ok()
            .filter(|v| v.is_object() || v.is_array()),
        _ => None,
    }
}

fn items_hold(items: &[JsonValue], constraints: &PortConstraints) -> bool {
    match constraints.item_type {
        Some(item_type) => {
            let unconstrained = PortConstraints::default();
            items
                .iter()
                .all(|item| item_type.validate(item, &unconstrained))
        }
        None => true,
    }
}

fn convert_array(
    value: &JsonValue,
    constraints: &PortConstraints,
) -> Result<JsonValue, ConversionError> {
    let items = match parse_structured(value) {
        Some(JsonValue::Array(items)) => items,
        _ if value.is_null() => {
            return Err(ConversionError::new(
                DataType::Array,
                "null cannot be wrapped into an array",
            ));
        }
        _ => vec![value.clone()],
    };

    let items = match constraints.item_type {
        Some(item_type) => {
            let unconstrained = PortConstraints::default();
            items
                .iter()
                .map(|item| item_type.convert(item, &unconstrained))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    ConversionError::new(DataType::Array, format!("array item: {}", e.reason))
                })?
        }
        None => items,
    };
    Ok(JsonValue::Array(items))
}

fn to_display_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        structured => Some(structured.to_string()),
    }
}

fn file_path(value: &JsonValue) -> Option<&str> {
    match value {
        JsonValue::String(s) => Some(s.trim()).filter(|s| !s.is_empty()),
        JsonValue::Object(map) => map.get("path").and_then(JsonValue::as_str),
        _ => None,
    }
}

/// A file handle passed by value rather than by path.
fn is_stream_like(value: &JsonValue) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("content") || map.contains_key("stream"))
}

fn extension_allowed(path: &str, constraints: &PortConstraints) -> bool {
    let Some(allowed) = &constraints.allowed_extensions else {
        return true;
    };
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    allowed
        .iter()
        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

fn parse_date(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
}
