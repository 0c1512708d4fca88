//! Strict RFC 5322 header-block parsing.
//!
//! Unlike a reader that silently skips garbage, [`HeaderSet::parse`] stops at
//! the first line it cannot accept and says which one, so the repair engine
//! can decide how to fix the text.

use std::fmt;

use crate::error::HeaderError;

/// Character sets the writer can declare on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    UsAscii,
}

impl Charset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::UsAscii => "us-ascii",
        }
    }

    /// Map a charset label to a supported charset, if it is one.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "us-ascii" | "ascii" => Some(Charset::UsAscii),
            _ => None,
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `name: value` field, with continuation lines already unfolded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

/// An ordered, mutable set of header fields.
///
/// Field order and duplicates are preserved. Lookups ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    fields: Vec<HeaderField>,
}

impl HeaderSet {
    /// Parse a header block.
    ///
    /// Lines may end in `\n` or `\r\n`. The block ends at the first empty
    /// line or at the end of the text; anything after an empty line is ignored.
    pub fn parse(text: &str) -> Result<Self, HeaderError> {
        let mut fields: Vec<HeaderField> = Vec::new();

        for raw_line in text.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            if line.is_empty() {
                break;
            }

            if line.starts_with(is_folding_whitespace) {
                let Some(last) = fields.last_mut() else {
                    return Err(HeaderError::MalformedInitialLine(line.to_string()));
                };
                let continuation = line.trim();
                if continuation.contains(is_value_noise) {
                    return Err(HeaderError::MalformedValue(last.name.clone()));
                }
                if !continuation.is_empty() {
                    if !last.value.is_empty() {
                        last.value.push(' ');
                    }
                    last.value.push_str(continuation);
                }
                continue;
            }

            let Some(colon) = line.find(':') else {
                return Err(HeaderError::MalformedLine(line.to_string()));
            };
            let name = line[..colon].trim_matches(is_folding_whitespace);
            if name.is_empty() || !name.bytes().all(is_token_byte) {
                return Err(HeaderError::MalformedKey(name.to_string()));
            }
            let value = line[colon + 1..].trim();
            if value.contains(is_value_noise) {
                return Err(HeaderError::MalformedValue(name.to_string()));
            }
            fields.push(HeaderField {
                name: name.to_string(),
                value: value.to_string(),
            });
        }

        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All fields in their original order.
    pub fn fields(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    /// Value of the first field called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    #[cfg(test)]
    fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// Replace the first field called `name` and drop any others with that
    /// name, or append the field if absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name)) {
            Some(pos) => {
                self.fields[pos].value = value;
                let mut index = 0;
                self.fields.retain(|f| {
                    let keep = index <= pos || !f.name.eq_ignore_ascii_case(name);
                    index += 1;
                    keep
                });
            }
            None => self.fields.push(HeaderField {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// The `charset` parameter of `Content-Type`, unquoted.
    pub fn charset(&self) -> Option<String> {
        let content_type = self.get("Content-Type")?;
        split_params(content_type)
            .skip(1)
            .find_map(|param| {
                let (key, value) = param.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("charset")
                    .then(|| value.trim().trim_matches('"').to_string())
            })
    }

    /// Declare `charset` on `Content-Type`, whatever the source declared.
    ///
    /// The media type and other parameters are kept; a missing
    /// `Content-Type` becomes `text/plain`.
    pub fn force_charset(&mut self, charset: Charset) {
        let current = self.get("Content-Type").unwrap_or("text/plain").to_string();
        let mut params = split_params(&current);
        let media_type = match params.next().map(str::trim) {
            Some(media) if !media.is_empty() => media.to_string(),
            _ => "text/plain".to_string(),
        };

        let mut value = media_type;
        for param in params {
            let param = param.trim();
            let is_charset = param
                .split_once('=')
                .map(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
                .unwrap_or(false);
            if !param.is_empty() && !is_charset {
                value.push_str("; ");
                value.push_str(param);
            }
        }
        value.push_str("; charset=");
        value.push_str(charset.as_str());

        self.set("Content-Type", value);
    }
}

/// Split a structured value on `;`, ignoring separators inside quotes.
fn split_params(value: &str) -> impl Iterator<Item = &str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts.into_iter()
}

fn is_folding_whitespace(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Characters no decoded header value may carry.
fn is_value_noise(c: char) -> bool {
    c == '\0' || c == char::REPLACEMENT_CHARACTER
}

/// RFC 7230 `tchar`.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}
