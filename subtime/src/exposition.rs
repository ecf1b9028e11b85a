//! Line parser for the Prometheus text exposition format.
//!
//! Only the subset emitted by the upstream monitoring service is recognized:
//!
//! ```text
//! metric_name{key="value", key="value"} 42.5
//! ```
//!
//! Parsing is lenient. A line that does not have this shape is reported as
//! [`ParsedLine::Skip`] and never aborts the scrape. The rules are:
//!
//! - Lines starting with `#` and blank lines are skipped.
//! - The metric name matches `[a-zA-Z_][a-zA-Z0-9_]*` and starts at column 0.
//! - The label block is non-empty and contains no `}`. Inside it, every
//!   `key="value"` pair (key made of `[A-Za-z0-9_]`) is collected; anything
//!   between pairs is ignored.
//! - At least one whitespace character separates `}` from a non-empty
//!   remainder. The value is the first whitespace-separated token of that
//!   remainder; an optional trailing timestamp is ignored. A remainder made
//!   only of whitespace still yields a sample, valued `NaN`.
//! - The value is read from the longest leading decimal number of the token,
//!   so `87ms` reads as `87`. Tokens with no leading digits fall back to the
//!   exposition spellings (`NaN`, `+Inf`, `-Inf`). Anything else is `NaN`.
//!
//! Label values are taken verbatim up to the next `"`. Escape sequences such
//! as `\"` are not interpreted, so a value containing an escaped quote is cut
//! short at that quote.

use std::collections::BTreeMap;

/// Label set of a single sample, keyed by label name.
pub type Labels = BTreeMap<String, String>;

/// One observation parsed from a metric line.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Metric family name.
    pub metric: String,
    /// Labels attached to the observation.
    pub labels: Labels,
    /// Observed value, `NaN` when the value text was not a number.
    pub value: f64,
}

/// Classification of a single input line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// The line carried a sample.
    Sample(Sample),
    /// Comment, blank, or a line that does not match the grammar.
    Skip,
}

impl ParsedLine {
    /// Return the sample, if any.
    pub fn into_sample(self) -> Option<Sample> {
        match self {
            ParsedLine::Sample(sample) => Some(sample),
            ParsedLine::Skip => None,
        }
    }
}

/// Parse one line of exposition text.
pub fn parse_line(line: &str) -> ParsedLine {
    if line.starts_with('#') || line.trim().is_empty() {
        return ParsedLine::Skip;
    }

    match parse_sample(line) {
        Some(sample) => ParsedLine::Sample(sample),
        None => ParsedLine::Skip,
    }
}

fn parse_sample(line: &str) -> Option<Sample> {
    let name_len = identifier_len(line);
    if name_len == 0 {
        return None;
    }
    let (metric, rest) = line.split_at(name_len);

    let rest = rest.strip_prefix('{')?;
    let close = rest.find('}')?;
    let block = &rest[..close];
    if block.is_empty() {
        return None;
    }

    let remainder = rest[close + 1..].strip_prefix(char::is_whitespace)?;
    if remainder.is_empty() {
        return None;
    }
    let value = remainder
        .split_whitespace()
        .next()
        .map_or(f64::NAN, parse_value);

    Some(Sample {
        metric: metric.to_string(),
        labels: parse_labels(block),
        value,
    })
}

/// Length in bytes of the metric identifier at the start of `line`.
fn identifier_len(line: &str) -> usize {
    let bytes = line.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return 0,
    }

    1 + bytes[1..].iter().take_while(|b| is_word_byte(**b)).count()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Collect every `key="value"` pair found in a label block.
///
/// A key seen twice keeps its last value.
fn parse_labels(block: &str) -> Labels {
    let mut labels = Labels::new();
    let mut pos = 0;

    while pos < block.len() {
        match label_pair_at(block, pos) {
            Some((key, value, next)) => {
                labels.insert(key.to_string(), value.to_string());
                pos = next;
            }
            None => pos += 1,
        }
    }

    labels
}

/// Try to match `key="value"` starting exactly at byte `start`.
///
/// Returns the key, the raw value and the byte offset just past the closing
/// quote.
fn label_pair_at(block: &str, start: usize) -> Option<(&str, &str, usize)> {
    let bytes = block.as_bytes();
    let key_len = bytes[start..]
        .iter()
        .take_while(|b| is_word_byte(**b))
        .count();
    if key_len == 0 {
        return None;
    }

    let key_end = start + key_len;
    if bytes.get(key_end) != Some(&b'=') || bytes.get(key_end + 1) != Some(&b'"') {
        return None;
    }

    let value_start = key_end + 2;
    let value_end = value_start + block[value_start..].find('"')?;

    Some((
        &block[start..key_end],
        &block[value_start..value_end],
        value_end + 1,
    ))
}

fn parse_value(text: &str) -> f64 {
    let prefix = decimal_prefix_len(text);
    if prefix > 0 {
        return text[..prefix].parse().unwrap_or(f64::NAN);
    }
    text.parse().unwrap_or(f64::NAN)
}

/// Length of the longest `[+-]?digits[.digits][(e|E)[+-]?digits]` prefix,
/// or 0 when the mantissa has no digit.
fn decimal_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        bytes[start.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut pos = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        pos += 1;
    }

    let int_digits = digits_from(pos);
    pos += int_digits;

    let mut frac_digits = 0;
    if bytes.get(pos) == Some(&b'.') {
        frac_digits = digits_from(pos + 1);
        if int_digits > 0 || frac_digits > 0 {
            pos += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_from(exp);
        if exp_digits > 0 {
            pos = exp + exp_digits;
        }
    }

    pos
}
