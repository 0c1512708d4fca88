//! Export messages as individual `.eml` files.
//!
//! Output layout: `<output>/<folder>/<index>.eml`. The file is assembled in a
//! hidden temporary file next to its final path and renamed into place only
//! once complete, so a failed export leaves nothing behind.

use std::io::{BufWriter, Write};

use tracing::{debug, info, warn};

use crate::archive::{Archive, AttachmentRef, Folder, MessageRef};
use crate::context::{BodyPreference, ExportContext};
use crate::error::{ExportError, Result};
use crate::export::repair::parse_or_repair;
use crate::export::{ExportStrategy, ExportedMessage};
use crate::mime::{AttachmentHeader, BodyType, Charset, MailWriter};

/// Writes each message as a standalone RFC 5322 file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmlStrategy;

impl ExportStrategy for EmlStrategy {
    fn name(&self) -> &'static str {
        "eml"
    }

    fn export(
        &self,
        archive: &mut dyn Archive,
        message: &MessageRef,
        index: usize,
        folder: &Folder,
        ctx: &ExportContext,
    ) -> Result<ExportedMessage> {
        let dir = ctx.output_dir().join(folder_dir_name(&folder.display_name));
        std::fs::create_dir_all(&dir).map_err(|e| ExportError::io(&dir, e))?;
        let path = dir.join(format!("{index}.eml"));

        let raw_headers = archive.headers(message)?;

        let (body, body_type) = select_body(archive, message, ctx.body_preference());
        if body.is_empty() {
            warn!(index, "Message body is empty");
        }

        let mut headers = parse_or_repair(&raw_headers, ctx.max_repair_attempts())?;
        headers.force_charset(Charset::Utf8);

        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{index}."))
            .suffix(".eml.tmp")
            .tempfile_in(&dir)
            .map_err(|e| ExportError::io(&dir, e))?;

        let mut writer = MailWriter::create(BufWriter::new(tmp), &headers)
            .map_err(|e| ExportError::io(&path, e))?;
        let (attachments_written, attachments_skipped) =
            write_attachments(archive, message, &mut writer);
        writer
            .write_inline(body_type, &body)
            .map_err(|e| ExportError::io(&path, e))?;

        let tmp = writer
            .finish()
            .map_err(|e| ExportError::io(&path, e))?
            .into_inner()
            .map_err(|e| ExportError::io(&path, e.into_error()))?;
        let file = tmp.persist(&path).map_err(|e| ExportError::io(&path, e.error))?;
        let bytes = file
            .metadata()
            .map_err(|e| ExportError::io(&path, e))?
            .len();

        debug!(path = %path.display(), bytes, "Wrote message");
        Ok(ExportedMessage {
            path,
            body_type,
            attachments_written,
            attachments_skipped,
            bytes,
        })
    }
}

/// Pick the body to carry, never failing: an unavailable body is empty.
fn select_body(
    archive: &mut dyn Archive,
    message: &MessageRef,
    preference: BodyPreference,
) -> (String, BodyType) {
    if preference == BodyPreference::PreferHtml {
        match archive.html_body(message) {
            Ok(html) => return (html, BodyType::Html),
            Err(e) => debug!(error = %e, "No HTML body, falling back to plain text"),
        }
    }

    match archive.plain_body(message) {
        Ok(plain) => (plain, BodyType::Plain),
        Err(e) => {
            info!(error = %e, "Failed to get body from message");
            (String::new(), BodyType::Plain)
        }
    }
}

/// Copy every readable, named attachment into `writer`.
///
/// Returns `(written, skipped)`. Nothing here fails the export.
fn write_attachments<W: Write>(
    archive: &mut dyn Archive,
    message: &MessageRef,
    writer: &mut MailWriter<W>,
) -> (usize, usize) {
    let attachments = match archive.attachments(message) {
        Ok(attachments) => attachments,
        Err(e) => {
            warn!(error = %e, "Failed to get message attachments");
            return (0, 0);
        }
    };

    let mut written = 0;
    let mut skipped = 0;
    for attachment in &attachments {
        match write_attachment(archive, attachment, writer) {
            Ok(()) => written += 1,
            Err(e) => {
                warn!(attachment = attachment.index, error = %e, "Skipping attachment");
                skipped += 1;
            }
        }
    }
    (written, skipped)
}

fn write_attachment<W: Write>(
    archive: &mut dyn Archive,
    attachment: &AttachmentRef,
    writer: &mut MailWriter<W>,
) -> Result<()> {
    let name = archive
        .attachment_long_filename(attachment)
        .or_else(|_| archive.attachment_short_filename(attachment))
        .map_err(|_| ExportError::AttachmentNameUnavailable)?;
    let data = archive.read_attachment(attachment)?;
    let header = AttachmentHeader::new(name);
    writer
        .write_attachment(&header, &data)
        .map_err(|e| ExportError::io(header.filename(), e))
}

/// Map a folder display name to a single, safe path component.
pub fn folder_dir_name(display_name: &str) -> String {
    let name: String = display_name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    match name.trim() {
        "" | "." | ".." => "_".to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::memory::{MemoryArchive, MemoryAttachment, MemoryMessage};
    use mail_parser::{MessageParser, MimeHeaders};
    use std::sync::{Arc, Mutex};

    const HEADERS: &str = "From: alice@example.com\r\nTo: bob@example.com\r\nSubject: Quarterly\r\n";

    struct Fixture {
        archive: MemoryArchive,
        folder: Folder,
        out: tempfile::TempDir,
    }

    impl Fixture {
        fn new(folder_name: &str, messages: Vec<MemoryMessage>) -> Self {
            let mut archive = MemoryArchive::new("root");
            let root = archive.root();
            let id = archive.add_folder(root, folder_name);
            for message in messages {
                archive.add_message(id, message);
            }
            Self {
                archive,
                folder: Folder {
                    id,
                    display_name: folder_name.to_string(),
                },
                out: tempfile::tempdir().unwrap(),
            }
        }

        fn ctx(&self) -> ExportContext {
            ExportContext::new("unused", self.out.path(), "eml")
        }

        fn export(&mut self, index: usize, ctx: &ExportContext) -> Result<ExportedMessage> {
            let message = MessageRef {
                folder: self.folder.id,
                index,
            };
            EmlStrategy.export(&mut self.archive, &message, index, &self.folder, ctx)
        }

        fn folder_dir(&self) -> std::path::PathBuf {
            self.out.path().join(folder_dir_name(&self.folder.display_name))
        }

        fn dir_entries(&self) -> Vec<String> {
            std::fs::read_dir(self.folder_dir())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        }
    }

    #[test]
    fn test_prefers_html() {
        let msg = MemoryMessage::new(HEADERS)
            .with_plain("plain text")
            .with_html("<p>html</p>");
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        assert_eq!(exported.body_type, BodyType::Html);
        assert_eq!(exported.path, fx.out.path().join("Inbox").join("0.eml"));
        assert_eq!(exported.bytes, std::fs::metadata(&exported.path).unwrap().len());

        let raw = std::fs::read(&exported.path).unwrap();
        let parsed = MessageParser::default().parse(&raw).unwrap();
        assert_eq!(parsed.subject(), Some("Quarterly"));
        assert!(parsed.body_html(0).unwrap().contains("<p>html</p>"));
        assert!(!String::from_utf8_lossy(&raw).contains("plain text"));
    }

    #[test]
    fn test_plaintext_only() {
        let msg = MemoryMessage::new(HEADERS)
            .with_plain("plain text")
            .with_html("<p>html</p>");
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx().with_body_preference(BodyPreference::PlaintextOnly);

        for _ in 0..2 {
            let exported = fx.export(0, &ctx).unwrap();
            assert_eq!(exported.body_type, BodyType::Plain);
            let raw = std::fs::read_to_string(&exported.path).unwrap();
            assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
            assert!(raw.contains("plain text"));
            assert!(!raw.contains("<p>html</p>"));
        }
        assert_eq!(fx.dir_entries(), vec!["0.eml".to_string()]);
    }

    #[test]
    fn test_falls_back_to_plain() {
        let msg = MemoryMessage::new(HEADERS).with_plain("only plain");
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();
        let exported = fx.export(0, &ctx).unwrap();
        assert_eq!(exported.body_type, BodyType::Plain);
    }

    /// Shared sink for a test-local `tracing` subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_empty_body_still_exported() {
        let mut fx = Fixture::new("Inbox", vec![MemoryMessage::new(HEADERS)]);
        let ctx = fx.ctx();

        let logs = LogBuffer::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let exported =
            tracing::subscriber::with_default(subscriber, || fx.export(0, &ctx)).unwrap();
        assert_eq!(exported.body_type, BodyType::Plain);

        let logged = logs.contents();
        assert!(logged.contains("WARN"), "{logged}");
        assert!(logged.contains("Message body is empty"), "{logged}");

        let raw = std::fs::read_to_string(&exported.path).unwrap();
        assert_eq!(raw.matches("Content-Disposition: inline").count(), 1);
        assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(raw.contains("Content-Transfer-Encoding: quoted-printable\r\n\r\n\r\n--"));
    }

    #[test]
    fn test_body_present_logs_no_warning() {
        let mut fx = Fixture::new("Inbox", vec![MemoryMessage::new(HEADERS).with_plain("hi")]);
        let ctx = fx.ctx();

        let logs = LogBuffer::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, || fx.export(0, &ctx)).unwrap();
        assert!(!logs.contents().contains("Message body is empty"));
    }

    #[test]
    fn test_nameless_attachment_skipped() {
        let msg = MemoryMessage::new(HEADERS)
            .with_plain("see attached")
            .with_attachment(MemoryAttachment::new(Some("long.txt"), Some("LONG~1.TXT"), b"one"))
            .with_attachment(MemoryAttachment::new(None, None, b"nameless"))
            .with_attachment(MemoryAttachment::new(None, Some("short.txt"), b"three"));
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        assert_eq!(exported.attachments_written, 2);
        assert_eq!(exported.attachments_skipped, 1);

        let raw = std::fs::read(&exported.path).unwrap();
        let parsed = MessageParser::default().parse(&raw).unwrap();
        assert_eq!(parsed.attachment_count(), 2);
        assert_eq!(parsed.attachment(0).unwrap().attachment_name(), Some("long.txt"));
        assert_eq!(parsed.attachment(0).unwrap().contents(), b"one");
        assert_eq!(parsed.attachment(1).unwrap().attachment_name(), Some("short.txt"));
        assert!(parsed.body_text(0).unwrap().contains("see attached"));
    }

    #[test]
    fn test_unreadable_attachment_skipped() {
        let msg = MemoryMessage::new(HEADERS)
            .with_attachment(MemoryAttachment::new(Some("bad.bin"), None, b"x").unreadable())
            .with_attachment(MemoryAttachment::new(Some("good.bin"), None, b"y"));
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        assert_eq!((exported.attachments_written, exported.attachments_skipped), (1, 1));
        let raw = std::fs::read_to_string(&exported.path).unwrap();
        assert!(raw.contains("good.bin"));
        assert!(!raw.contains("bad.bin"));
    }

    #[test]
    fn test_attachment_enumeration_failure_exports_without_attachments() {
        let msg = MemoryMessage::new(HEADERS)
            .with_plain("body")
            .with_attachment(MemoryAttachment::new(Some("a.txt"), None, b"a"))
            .with_attachments_unavailable();
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        assert_eq!((exported.attachments_written, exported.attachments_skipped), (0, 0));
        assert!(exported.path.exists());
    }

    #[test]
    fn test_missing_headers_leave_no_file() {
        let mut fx = Fixture::new("Inbox", vec![MemoryMessage::without_headers()]);
        let ctx = fx.ctx();
        assert!(matches!(fx.export(0, &ctx), Err(ExportError::Archive(_))));
        assert!(fx.dir_entries().is_empty());
    }

    #[test]
    fn test_unrecoverable_headers_leave_no_file() {
        let msg = MemoryMessage::new(" leading continuation\r\nSubject: x\r\n").with_plain("body");
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();
        let err = fx.export(0, &ctx).unwrap_err();
        assert!(matches!(err, ExportError::Header(_)));
        assert!(fx.dir_entries().is_empty());
    }

    #[test]
    fn test_repaired_headers() {
        let msg = MemoryMessage::new("Sub\0ject: Hi\r\nnot a header\r\nFrom: a@b.com\r\n")
            .with_plain("body");
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        let raw = std::fs::read_to_string(&exported.path).unwrap();
        assert!(raw.starts_with("Subject: Hi\r\nFrom: a@b.com\r\n"));
        assert!(!raw.contains("not a header"));
    }

    #[test]
    fn test_nul_in_header_value_is_stripped() {
        let msg = MemoryMessage::new("Subject: Hi\0\r\nFrom: a@b.com\r\n").with_plain("body");
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        let raw = std::fs::read(&exported.path).unwrap();
        assert!(!raw.contains(&0u8));
        let parsed = MessageParser::default().parse(&raw).unwrap();
        assert_eq!(parsed.subject(), Some("Hi"));
        assert!(String::from_utf8_lossy(&raw).starts_with("Subject: Hi\r\nFrom: a@b.com\r\n"));
    }

    #[test]
    fn test_source_charset_is_replaced() {
        let headers = "Subject: x\r\nContent-Type: text/plain; charset=windows-1252\r\n";
        let msg = MemoryMessage::new(headers).with_plain("caf\u{e9}");
        let mut fx = Fixture::new("Inbox", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        let raw = std::fs::read_to_string(&exported.path).unwrap();
        assert!(!raw.contains("windows-1252"));
        let parsed = MessageParser::default().parse(raw.as_bytes()).unwrap();
        assert!(parsed.body_text(0).unwrap().contains("caf\u{e9}"));
    }

    #[test]
    fn test_unsafe_folder_name() {
        let msg = MemoryMessage::new(HEADERS).with_plain("x");
        let mut fx = Fixture::new("../escape", vec![msg]);
        let ctx = fx.ctx();

        let exported = fx.export(0, &ctx).unwrap();
        assert_eq!(exported.path, fx.out.path().join(".._escape").join("0.eml"));
    }

    #[test]
    fn test_folder_dir_name() {
        assert_eq!(folder_dir_name("Inbox"), "Inbox");
        assert_eq!(folder_dir_name("Sent Items"), "Sent Items");
        assert_eq!(folder_dir_name("a/b\\c"), "a_b_c");
        assert_eq!(folder_dir_name("tab\there"), "tab_here");
        assert_eq!(folder_dir_name(""), "_");
        assert_eq!(folder_dir_name("."), "_");
        assert_eq!(folder_dir_name(".."), "_");
    }

    #[test]
    fn test_index_names_file() {
        let msgs = vec![
            MemoryMessage::new(HEADERS).with_plain("a"),
            MemoryMessage::new(HEADERS).with_plain("b"),
        ];
        let mut fx = Fixture::new("Inbox", msgs);
        let ctx = fx.ctx();
        let exported = fx.export(1, &ctx).unwrap();
        assert_eq!(exported.path.file_name().unwrap(), "1.eml");
    }
}
