//! Recognition of the optional expiry annotation that follows a device id.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Labels commonly written in front of an expiry date, matched case-insensitively.
/// Longer labels come first so "expires on" wins over "expires".
const LABELS: &[&str] = &[
    "valid until",
    "expiration date",
    "expiration",
    "expires on",
    "expires",
    "expiry date",
    "expiry",
    "exp",
    "until",
    "end",
];

const DATETIME_FORMATS: &[&str] = &[
    "%B %d, %Y, %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y, %H:%M",
    "%b %d, %Y, %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
];

/// What followed a device identifier on its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Trailing {
    /// Nothing but separators
    Empty,
    /// A date/time expression, verbatim with label and separators removed
    Expiry(String),
    /// Something that is not a date/time expression, verbatim and trimmed
    Malformed(String),
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | ':' | '|' | '-' | '=' | '>' | '(' | ')' | '[' | ']')
}

fn strip_label(text: &str) -> &str {
    let lowered = text.to_ascii_lowercase();
    for label in LABELS {
        if lowered.starts_with(label) {
            let rest = &text[label.len()..];
            // Only a whole word counts as a label ("endless" is not "end").
            if rest.chars().next().map_or(true, |c| !c.is_alphanumeric()) {
                return rest;
            }
        }
    }
    text
}

fn parses_as_date_time(text: &str) -> bool {
    if DateTime::parse_from_rfc3339(text).is_ok() {
        return true;
    }
    DATETIME_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(text, format).is_ok())
        || DATE_FORMATS
            .iter()
            .any(|format| NaiveDate::parse_from_str(text, format).is_ok())
}

/// Classify the text between a device identifier and the end of its record.
pub(crate) fn classify(segment: &str) -> Trailing {
    let trimmed = segment.trim_matches(is_separator);
    if trimmed.is_empty() {
        return Trailing::Empty;
    }

    let candidate = strip_label(trimmed).trim_matches(is_separator);
    if !candidate.is_empty() && parses_as_date_time(candidate) {
        Trailing::Expiry(candidate.to_string())
    } else {
        Trailing::Malformed(trimmed.to_string())
    }
}
