//! Content extraction from one raw mbox message: header text, bodies, attachments.

use mail_parser::{MessageParser, MimeHeaders, PartType};

/// Strip the `From ` separator line (and a leading BOM) from raw message bytes.
pub fn strip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
        return &[];
    }
    data
}

/// The raw header block as text: everything before the first blank line.
///
/// Decoded as UTF-8 when valid, else as Windows-1252 (which accepts every byte).
/// NUL bytes and other control characters are passed through untouched.
pub fn header_text(message: &[u8]) -> String {
    let end = find_header_end(message).unwrap_or(message.len());
    decode_header_bytes(&message[..end])
}

/// Everything an export reads from one message, taken from a single MIME parse.
#[derive(Debug, Default)]
pub struct MessageParts {
    pub headers: String,
    /// Body of the first genuine `text/plain` part.
    pub plain: Option<String>,
    /// Body of the first genuine `text/html` part.
    pub html: Option<String>,
    pub attachments: Vec<AttachmentPart>,
}

#[derive(Debug)]
pub struct AttachmentPart {
    /// `Content-Disposition` `filename`.
    pub long_name: Option<String>,
    /// `Content-Type` `name`.
    pub short_name: Option<String>,
    pub contents: Vec<u8>,
}

impl MessageParts {
    pub fn extract(message: &[u8]) -> Self {
        let headers = header_text(message);
        let Some(parsed) = MessageParser::default().parse(message) else {
            return Self {
                headers,
                ..Self::default()
            };
        };

        let plain = parsed.text_part(0).and_then(|part| match &part.body {
            PartType::Text(text) => Some(text.to_string()),
            _ => None,
        });
        let html = parsed.html_part(0).and_then(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        });
        let attachments = (0..parsed.attachment_count())
            .filter_map(|index| parsed.attachment(index))
            .map(|part| AttachmentPart {
                long_name: non_blank(
                    part.content_disposition()
                        .and_then(|d| d.attribute("filename")),
                ),
                short_name: non_blank(part.content_type().and_then(|ct| ct.attribute("name"))),
                contents: part.contents().to_vec(),
            })
            .collect();

        Self {
            headers,
            plain,
            html,
            attachments,
        }
    }
}

fn non_blank(name: Option<&str>) -> Option<String> {
    name.filter(|n| !n.trim().is_empty()).map(String::from)
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    if data.starts_with(b"\n") || data.starts_with(b"\r\n") {
        return Some(0);
    }
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len()
            && data[i] == b'\r'
            && data[i + 1] == b'\n'
            && data[i + 2] == b'\r'
            && data[i + 3] == b'\n'
        {
            return Some(i);
        }
    }
    None
}

fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}
