//! MIME output: a `multipart/mixed` message built part by part.
//!
//! The writer owns the top-level header and the boundary. Each part is
//! fully encoded in memory before any byte of it reaches the output, so a
//! part that cannot be built leaves the output untouched.

use std::collections::hash_map::RandomState;
use std::fmt::Write as _;
use std::hash::{BuildHasher, Hasher};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::mime::header::{Charset, HeaderSet};

/// Preferred maximum length of a header line, excluding CRLF.
const MAX_HEADER_LINE: usize = 78;

/// Maximum length of an encoded body line, excluding CRLF.
const MAX_BODY_LINE: usize = 76;

/// Top-level fields the writer replaces with its own.
const REPLACED_FIELDS: [&str; 3] = ["Content-Type", "Content-Transfer-Encoding", "MIME-Version"];

/// Media type of the inline body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    #[default]
    Plain,
    Html,
}

impl BodyType {
    pub fn mime_type(&self) -> &'static str {
        match self {
            BodyType::Plain => "text/plain",
            BodyType::Html => "text/html",
        }
    }
}

/// Media type declared on every attachment part.
const ATTACHMENT_TYPE: &str = "application/octet-stream";

/// Header of one attachment part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentHeader {
    filename: String,
}

impl AttachmentHeader {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Streams a `multipart/mixed` message into `W`.
pub struct MailWriter<W: Write> {
    out: W,
    boundary: String,
    charset: Charset,
}

impl<W: Write> MailWriter<W> {
    /// Write the top-level header and open the multipart body.
    ///
    /// The charset declared on `headers` (after `force_charset`) is carried
    /// onto the inline part; anything unsupported falls back to UTF-8.
    pub fn create(out: W, headers: &HeaderSet) -> io::Result<Self> {
        let charset = headers
            .charset()
            .and_then(|label| Charset::from_label(&label))
            .unwrap_or(Charset::Utf8);
        let boundary = new_boundary();

        let mut head = String::new();
        for field in headers.fields() {
            if REPLACED_FIELDS
                .iter()
                .any(|name| field.name.eq_ignore_ascii_case(name))
            {
                continue;
            }
            head.push_str(&fold_field(&field.name, &field.value));
        }
        head.push_str("MIME-Version: 1.0\r\n");
        let _ = write!(
            head,
            "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n"
        );

        let mut writer = Self {
            out,
            boundary,
            charset,
        };
        writer.emit(head.as_bytes())?;
        Ok(writer)
    }

    /// Append one base64-encoded attachment part.
    pub fn write_attachment(&mut self, header: &AttachmentHeader, data: &[u8]) -> io::Result<()> {
        let name = sanitize_filename(header.filename());
        let mut part = String::with_capacity(data.len() * 4 / 3 + 256);
        let _ = write!(part, "--{}\r\n", self.boundary);
        let _ = write!(
            part,
            "Content-Type: {ATTACHMENT_TYPE}; {}\r\n",
            encode_param("name", &name)
        );
        let _ = write!(
            part,
            "Content-Disposition: attachment; {}\r\n",
            encode_param("filename", &name)
        );
        part.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        part.push_str(&base64_lines(data));
        part.push_str("\r\n");
        self.emit(part.as_bytes())
    }

    /// Append the inline body part.
    pub fn write_inline(&mut self, body_type: BodyType, body: &str) -> io::Result<()> {
        let mut part = String::with_capacity(body.len() + body.len() / 8 + 192);
        let _ = write!(part, "--{}\r\n", self.boundary);
        let _ = write!(
            part,
            "Content-Type: {}; charset={}\r\n",
            body_type.mime_type(),
            self.charset
        );
        part.push_str("Content-Disposition: inline\r\n");
        part.push_str("Content-Transfer-Encoding: quoted-printable\r\n\r\n");
        part.push_str(&quoted_printable(body));
        part.push_str("\r\n");
        self.emit(part.as_bytes())
    }

    /// Close the multipart body, flush, and hand back the output.
    pub fn finish(mut self) -> io::Result<W> {
        let closing = format!("--{}--\r\n", self.boundary);
        self.emit(closing.as_bytes())?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }
}

/// `name: value` folded at spaces so lines stay within 78 columns where a
/// break point exists. Words longer than a line are left intact.
fn fold_field(name: &str, value: &str) -> String {
    let mut out = String::with_capacity(name.len() + value.len() + 8);
    out.push_str(name);
    out.push_str(": ");
    let first_col = out.len();
    let mut col = first_col;

    for (i, word) in value.split(' ').enumerate() {
        if i > 0 {
            if col + 1 + word.len() > MAX_HEADER_LINE && col > first_col && !word.is_empty() {
                out.push_str("\r\n ");
                col = 1;
            } else {
                out.push(' ');
                col += 1;
            }
        }
        out.push_str(word);
        col += word.len();
    }
    out.push_str("\r\n");
    out
}

/// Filename parameters never carry control characters.
fn sanitize_filename(name: &str) -> String {
    name.chars().filter(|c| !c.is_control()).collect()
}

/// `key="value"` for printable ASCII, else RFC 2231 `key*=utf-8''…`.
fn encode_param(key: &str, value: &str) -> String {
    if value.is_ascii() {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        return format!("{key}=\"{escaped}\"");
    }

    let mut encoded = format!("{key}*=utf-8''");
    for &b in value.as_bytes() {
        let attr_char = b.is_ascii_alphanumeric()
            || matches!(
                b,
                b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
            );
        if attr_char {
            encoded.push(b as char);
        } else {
            let _ = write!(encoded, "%{b:02X}");
        }
    }
    encoded
}

fn base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_BODY_LINE * 2);
    for (i, chunk) in encoded.as_bytes().chunks(MAX_BODY_LINE).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        // base64 output is pure ASCII.
        out.extend(chunk.iter().map(|&b| b as char));
    }
    out
}

/// RFC 2045 quoted-printable with CRLF hard breaks and `=` soft breaks.
fn quoted_printable(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        let bytes = line.strip_suffix('\r').unwrap_or(line).as_bytes();
        let mut col = 0;
        for (j, &b) in bytes.iter().enumerate() {
            let at_end = j + 1 == bytes.len();
            let literal = matches!(b, b'!'..=b'<' | b'>'..=b'~')
                || (matches!(b, b' ' | b'\t') && !at_end);
            let width = if literal { 1 } else { 3 };
            if col + width > MAX_BODY_LINE - 1 {
                out.push_str("=\r\n");
                col = 0;
            }
            if literal {
                out.push(b as char);
            } else {
                let _ = write!(out, "={b:02X}");
            }
            col += width;
        }
    }
    out
}

/// A boundary that cannot occur in base64 or quoted-printable output.
fn new_boundary() -> String {
    let mut hasher = RandomState::new().build_hasher();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    hasher.write_u128(nanos);
    let high = hasher.finish();
    hasher.write_u32(std::process::id());
    let low = hasher.finish();
    format!("=_{high:016x}{low:016x}")
}
