//! An archive assembled in code.
//!
//! Useful wherever an export run needs a folder tree without a file on disk:
//! tests, benchmarks, and callers that already hold messages in memory.
//! Every accessor failure the pipeline must tolerate can be reproduced here.

use crate::archive::{
    Archive, AttachmentRef, Encryption, Folder, FolderId, FormatType, MessageRef,
};
use crate::error::{ExportError, Result};

/// One attachment of a [`MemoryMessage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryAttachment {
    pub long_filename: Option<String>,
    pub short_filename: Option<String>,
    pub data: Vec<u8>,
    /// Make `read_attachment` fail for this attachment.
    pub unreadable: bool,
}

impl MemoryAttachment {
    pub fn new(long_filename: Option<&str>, short_filename: Option<&str>, data: &[u8]) -> Self {
        Self {
            long_filename: long_filename.map(String::from),
            short_filename: short_filename.map(String::from),
            data: data.to_vec(),
            unreadable: false,
        }
    }

    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }
}

/// One message of a [`MemoryArchive`].
#[derive(Debug, Clone, Default)]
pub struct MemoryMessage {
    /// `None` makes `headers` fail.
    pub headers: Option<String>,
    pub plain: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<MemoryAttachment>,
    /// Make `attachments` fail for this message.
    pub attachments_unavailable: bool,
}

impl MemoryMessage {
    pub fn new(headers: &str) -> Self {
        Self {
            headers: Some(headers.to_string()),
            ..Self::default()
        }
    }

    /// A message whose header fetch fails.
    pub fn without_headers() -> Self {
        Self::default()
    }

    pub fn with_plain(mut self, body: &str) -> Self {
        self.plain = Some(body.to_string());
        self
    }

    pub fn with_html(mut self, body: &str) -> Self {
        self.html = Some(body.to_string());
        self
    }

    pub fn with_attachment(mut self, attachment: MemoryAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_attachments_unavailable(mut self) -> Self {
        self.attachments_unavailable = true;
        self
    }
}

#[derive(Debug)]
struct Node {
    display_name: String,
    children: Vec<FolderId>,
    messages: Vec<MemoryMessage>,
}

/// A folder tree held entirely in memory.
#[derive(Debug)]
pub struct MemoryArchive {
    nodes: Vec<Node>,
    valid_signature: bool,
    encryption: Encryption,
    initialized: bool,
    closed: bool,
}

impl MemoryArchive {
    /// Create an archive whose root folder is called `root_name`.
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node {
                display_name: root_name.to_string(),
                children: Vec::new(),
                messages: Vec::new(),
            }],
            valid_signature: true,
            encryption: Encryption::None,
            initialized: false,
            closed: false,
        }
    }

    pub fn root(&self) -> FolderId {
        FolderId(0)
    }

    /// Append a child folder under `parent` and return its id.
    pub fn add_folder(&mut self, parent: FolderId, display_name: &str) -> FolderId {
        let id = FolderId(self.nodes.len());
        self.nodes.push(Node {
            display_name: display_name.to_string(),
            children: Vec::new(),
            messages: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_message(&mut self, folder: FolderId, message: MemoryMessage) {
        self.nodes[folder.0].messages.push(message);
    }

    /// Make the signature check report an invalid container.
    pub fn with_invalid_signature(mut self) -> Self {
        self.valid_signature = false;
        self
    }

    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn node(&self, id: FolderId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(ExportError::FolderNotFound(id.0))
    }

    fn message(&self, message: &MessageRef) -> Result<&MemoryMessage> {
        self.node(message.folder)?
            .messages
            .get(message.index)
            .ok_or(ExportError::MessageNotFound {
                folder: message.folder.0,
                index: message.index,
            })
    }

    fn attachment(&self, attachment: &AttachmentRef) -> Result<&MemoryAttachment> {
        self.message(&attachment.message)?
            .attachments
            .get(attachment.index)
            .ok_or(ExportError::AttachmentNotFound(attachment.index))
    }

    fn folder_handle(&self, id: FolderId) -> Result<Folder> {
        Ok(Folder {
            id,
            display_name: self.node(id)?.display_name.clone(),
        })
    }
}

impl Archive for MemoryArchive {
    fn is_valid_signature(&mut self) -> Result<bool> {
        Ok(self.valid_signature)
    }

    fn format_type(&mut self) -> Result<FormatType> {
        Ok(FormatType::Memory)
    }

    fn encryption_type(&mut self, _format: FormatType) -> Result<Encryption> {
        Ok(self.encryption.clone())
    }

    fn initialize_index(&mut self, _format: FormatType) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn root_folder(&mut self) -> Result<Folder> {
        self.folder_handle(self.root())
    }

    fn sub_folders(&mut self, folder: &Folder) -> Result<Vec<Folder>> {
        self.node(folder.id)?
            .children
            .iter()
            .map(|&id| self.folder_handle(id))
            .collect()
    }

    fn messages(&mut self, folder: &Folder) -> Result<Vec<MessageRef>> {
        let count = self.node(folder.id)?.messages.len();
        Ok((0..count)
            .map(|index| MessageRef {
                folder: folder.id,
                index,
            })
            .collect())
    }

    fn headers(&mut self, message: &MessageRef) -> Result<String> {
        self.message(message)?
            .headers
            .clone()
            .ok_or_else(|| ExportError::Archive("message has no header stream".into()))
    }

    fn plain_body(&mut self, message: &MessageRef) -> Result<String> {
        self.message(message)?
            .plain
            .clone()
            .ok_or(ExportError::BodyUnavailable("plain-text"))
    }

    fn html_body(&mut self, message: &MessageRef) -> Result<String> {
        self.message(message)?
            .html
            .clone()
            .ok_or(ExportError::BodyUnavailable("HTML"))
    }

    fn attachments(&mut self, message: &MessageRef) -> Result<Vec<AttachmentRef>> {
        let msg = self.message(message)?;
        if msg.attachments_unavailable {
            return Err(ExportError::Archive("attachment table unreadable".into()));
        }
        Ok((0..msg.attachments.len())
            .map(|index| AttachmentRef {
                message: *message,
                index,
            })
            .collect())
    }

    fn attachment_long_filename(&mut self, attachment: &AttachmentRef) -> Result<String> {
        self.attachment(attachment)?
            .long_filename
            .clone()
            .ok_or(ExportError::AttachmentNameUnavailable)
    }

    fn attachment_short_filename(&mut self, attachment: &AttachmentRef) -> Result<String> {
        self.attachment(attachment)?
            .short_filename
            .clone()
            .ok_or(ExportError::AttachmentNameUnavailable)
    }

    fn read_attachment(&mut self, attachment: &AttachmentRef) -> Result<Vec<u8>> {
        let att = self.attachment(attachment)?;
        if att.unreadable {
            return Err(ExportError::Archive("attachment stream unreadable".into()));
        }
        Ok(att.data.clone())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
