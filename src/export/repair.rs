//! Recovery of header blocks the strict parser rejects.
//!
//! Archives routinely hand back header text with embedded NULs, U+FFFD from
//! a lossy decode, or single lines that are not fields at all. Two fixes are
//! tried, chosen by the kind of parse error:
//!
//! - malformed key or value: strip every NUL and U+FFFD from the whole text;
//! - malformed line: drop every line identical to the offending one.
//!
//! The loop carries `(text, last error, remaining budget)`. Only a line fix
//! that leaves the error unchanged spends budget; every other step that
//! continues has strictly shortened the text, so the loop always terminates.

use tracing::{debug, warn};

use crate::error::HeaderError;
use crate::mime::HeaderSet;

/// Repair `raw` after its first parse failed with `error`.
///
/// Returns the parsed headers, the error a fix could not get past, or
/// [`HeaderError::Unrecoverable`] once `max_attempts` is used up.
pub fn repair(
    raw: &str,
    error: HeaderError,
    max_attempts: usize,
) -> Result<HeaderSet, HeaderError> {
    let mut text = raw.to_string();
    let mut error = error;
    let mut remaining = max_attempts;

    loop {
        if remaining == 0 {
            return Err(HeaderError::Unrecoverable);
        }

        match &error {
            HeaderError::MalformedKey(field) | HeaderError::MalformedValue(field) => {
                debug!(field = %field.escape_debug(), "Stripping NUL and replacement characters");
                text = strip_control_noise(&text);
                match HeaderSet::parse(&text) {
                    Ok(headers) => return Ok(headers),
                    Err(next) if next == error => return Err(next),
                    Err(next) => error = next,
                }
            }
            HeaderError::MalformedLine(line) => {
                warn!(line = %line.escape_debug(), "Removing malformed header line");
                text = remove_line(&text, line);
                match HeaderSet::parse(&text) {
                    Ok(headers) => return Ok(headers),
                    Err(next) if next == error => remaining -= 1,
                    Err(next) => error = next,
                }
            }
            HeaderError::MalformedInitialLine(_) | HeaderError::Unrecoverable => break,
        }
    }
    Err(error)
}

/// Parse `raw`, falling back to [`repair`] on failure.
pub fn parse_or_repair(raw: &str, max_attempts: usize) -> Result<HeaderSet, HeaderError> {
    match HeaderSet::parse(raw) {
        Ok(headers) => Ok(headers),
        Err(e) => repair(raw, e, max_attempts),
    }
}

fn strip_control_noise(text: &str) -> String {
    text.chars()
        .filter(|&c| c != '\0' && c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Rebuild `text` without any line equal to `offending`. Lines are compared
/// without their trailing `\r`, the same way the parser reports them.
fn remove_line(text: &str, offending: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if line == offending {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_error(text: &str) -> HeaderError {
        HeaderSet::parse(text).unwrap_err()
    }

    #[test]
    fn test_strips_nul_from_value_and_key() {
        let raw = "Sub\0ject: Hi\0\r\nFrom: a@b.com\r\n";
        let headers = repair(raw, first_error(raw), 10).unwrap();
        assert_eq!(headers.get("Subject"), Some("Hi"));
        assert_eq!(headers.get("From"), Some("a@b.com"));
    }

    #[test]
    fn test_nul_in_value_round_trip() {
        let raw = "Subject: Hi\0\r\nFrom: a@b.com\r\n";
        let err = first_error(raw);
        assert_eq!(err, HeaderError::MalformedValue("Subject".into()));
        let headers = parse_or_repair(raw, 10).unwrap();
        assert_eq!(headers.get("Subject"), Some("Hi"));
        assert_eq!(headers.get("From"), Some("a@b.com"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_value_fix_does_not_spend_budget() {
        let raw = "Subject: Hi\u{FFFD}\nFrom: a@b.com\n";
        let headers = repair(raw, first_error(raw), 1).unwrap();
        assert_eq!(headers.get("Subject"), Some("Hi"));
    }

    #[test]
    fn test_strips_replacement_character() {
        let raw = "\u{FFFD}\u{FFFD}Subject: Hello\nTo: c@d.com\n";
        let headers = repair(raw, first_error(raw), 10).unwrap();
        assert_eq!(headers.get("subject"), Some("Hello"));
    }

    #[test]
    fn test_key_fix_without_effect_fails_with_same_error() {
        let raw = "Bad Key: v\n";
        let err = first_error(raw);
        assert_eq!(repair(raw, err.clone(), 10).unwrap_err(), err);
    }

    #[test]
    fn test_key_fix_does_not_spend_budget() {
        let raw = "X\0-A: 1\ngarbage\nSubject: s\n";
        let headers = repair(raw, first_error(raw), 1).unwrap();
        assert_eq!(headers.get("X-A"), Some("1"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_removes_malformed_lines() {
        let raw = "Subject: Hi\r\nthis is not a header\r\nFrom: a@b.com\r\n";
        let headers = repair(raw, first_error(raw), 10).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("From"), Some("a@b.com"));
    }

    #[test]
    fn test_removes_every_copy_of_the_offending_line() {
        let raw = "Subject: Hi\njunk\nTo: x@y.com\njunk\n";
        let headers = repair(raw, first_error(raw), 1).unwrap();
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_line_fix_continues_after_a_different_error() {
        let raw = "Subject: Hi\nfirst junk\nsecond junk\nthird junk\nFrom: a@b.com\n";
        let headers = repair(raw, first_error(raw), 1).unwrap();
        assert_eq!(headers.get("Subject"), Some("Hi"));
        assert_eq!(headers.get("From"), Some("a@b.com"));
    }

    #[test]
    fn test_line_fix_exposing_bad_key() {
        let raw = "Subject: Hi\njunk\nBad\0Key: v\n";
        let headers = repair(raw, first_error(raw), 10).unwrap();
        assert_eq!(headers.get("BadKey"), Some("v"));
    }

    #[test]
    fn test_reported_line_missing_from_text() {
        let raw = "Subject: Hi\nreal junk\n";
        let err = HeaderError::MalformedLine("phantom".into());
        let headers = repair(raw, err, 3).unwrap();
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_zero_budget_is_unrecoverable() {
        let raw = "Subject: Hi\0\n";
        let err = first_error("Sub\0ject: x\n");
        assert_eq!(repair(raw, err, 0).unwrap_err(), HeaderError::Unrecoverable);
    }

    #[test]
    fn test_initial_continuation_is_not_repaired() {
        let raw = " folded: x\nSubject: y\n";
        let err = first_error(raw);
        assert!(matches!(err, HeaderError::MalformedInitialLine(_)));
        assert_eq!(repair(raw, err.clone(), 10).unwrap_err(), err);
    }

    #[test]
    fn test_parse_or_repair() {
        assert!(parse_or_repair("Subject: ok\n", 10).is_ok());
        assert_eq!(
            parse_or_repair("Subject: Hi\0\r\nnope\r\n", 10)
                .unwrap()
                .get("Subject"),
            Some("Hi")
        );
    }

    #[test]
    fn test_terminates_on_adversarial_input() {
        let mut raw = String::new();
        for i in 0..500 {
            raw.push_str(&format!("junk line {i}\n"));
            raw.push_str("\u{FFFD}\0X: y\n");
        }
        // Every step either fails outright or shrinks the text.
        let _ = repair(&raw, first_error(&raw), 10);
    }
}
