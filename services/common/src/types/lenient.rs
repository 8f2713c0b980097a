//! Field deserializers tolerant of the backend's loose JSON
//!
//! Money fields sometimes arrive as strings (`"12500.50"`) and identifiers as
//! numbers. Unparseable or missing values fall back to zero / empty.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(serde_json::Number),
}

/// `f64` from a number, a numeric string, or null
pub fn f64_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => n,
        Some(NumberOrString::Text(s)) => parse_leading_f64(&s),
        None => 0.0,
    })
}

/// `String` from a string, a number, or null
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::Text(s)) => s,
        Some(StringOrNumber::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

/// Parse the longest numeric prefix of `raw`, or 0
#[must_use]
pub fn parse_leading_f64(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    trimmed[..end].parse().unwrap_or(0.0)
}
