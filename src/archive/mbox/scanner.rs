//! Streaming mbox scanner.
//!
//! Reads an mbox file line-by-line through a large buffer and records where
//! every message starts and ends. Never loads the whole file into memory.
//! Tolerant of malformed input:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - `From ` lines not preceded by a blank line (logs a warning)
//! - Truncated messages at EOF
//! - UTF-8 BOM at the start of the file

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ExportError, Result};

/// Byte range of one message, starting at its `From ` separator line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpan {
    pub offset: u64,
    pub length: u64,
}

/// Indexes the message boundaries of one mbox file.
pub struct MboxScanner {
    path: PathBuf,
    file_size: u64,
    read_buffer_size: usize,
}

impl MboxScanner {
    pub fn new(path: impl AsRef<Path>, read_buffer_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExportError::FileNotFound(path.clone())
            } else {
                ExportError::io(&path, e)
            }
        })?;
        Ok(Self {
            path,
            file_size: metadata.len(),
            read_buffer_size: read_buffer_size.max(4096),
        })
    }

    /// Scan the whole file and return the span of every message, in file order.
    pub fn scan(&self) -> Result<Vec<MessageSpan>> {
        let mut spans = Vec::new();
        if self.file_size == 0 {
            return Ok(spans);
        }

        let file = File::open(&self.path).map_err(|e| ExportError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(self.read_buffer_size, file);

        let mut current_offset: u64 = 0;
        let mut message_start: Option<u64> = None;
        let mut prev_line_was_empty = true;
        let mut first_line = true;
        let mut at_line_start = true;

        // Reusable line buffer
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let line_len = {
                let buf = reader
                    .fill_buf()
                    .map_err(|e| ExportError::io(&self.path, e))?;
                if buf.is_empty() {
                    break; // EOF
                }
                let consume_len = match memchr_newline(buf) {
                    Some(pos) => pos + 1,
                    None => buf.len(),
                };
                line_buf.extend_from_slice(&buf[..consume_len]);
                reader.consume(consume_len);
                consume_len as u64
            };

            // A line longer than the buffer arrives in pieces; only the
            // piece at a line start can be a separator.
            if at_line_start && is_mbox_separator(&line_buf) {
                if !first_line && !prev_line_was_empty {
                    warn!(
                        path = %self.path.display(),
                        offset = current_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                if let Some(start) = message_start {
                    spans.push(MessageSpan {
                        offset: start,
                        length: current_offset - start,
                    });
                }
                message_start = Some(current_offset);
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            at_line_start = line_buf.ends_with(b"\n");
            first_line = false;
            current_offset += line_len;
        }

        if let Some(start) = message_start {
            spans.push(MessageSpan {
                offset: start,
                length: current_offset - start,
            });
        }

        debug!(
            path = %self.path.display(),
            count = spans.len(),
            "Scanned mbox"
        );
        Ok(spans)
    }
}

/// Whether the file is an mbox: empty, or its first line is a `From ` separator.
pub fn has_mbox_signature(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    let mut head = [0u8; 8];
    let mut filled = 0;
    while filled < head.len() {
        let n = file
            .read(&mut head[filled..])
            .map_err(|e| ExportError::io(path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled == 0 || is_mbox_separator(&head[..filled]))
}

/// Read a single message at the given span.
pub fn read_span(path: &Path, span: MessageSpan) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    file.seek(SeekFrom::Start(span.offset))
        .map_err(|e| ExportError::io(path, e))?;
    let mut buffer = vec![0u8; span.length as usize];
    file.read_exact(&mut buffer)
        .map_err(|e| ExportError::io(path, e))?;
    Ok(buffer)
}

/// Fast newline search (equivalent to memchr for `\n`).
#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Check whether a line is an mbox separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
