//! Archive access: the contract the export pipeline reads messages through,
//! plus the bundled MBOX-tree reader and an in-memory archive.
//!
//! Handles ([`Folder`], [`MessageRef`], [`AttachmentRef`]) are plain data.
//! All content lives behind the [`Archive`] that issued them and is fetched
//! on demand, one blocking call at a time.

pub mod mbox;
pub mod memory;

use std::fmt;

use crate::error::Result;

/// Opaque identifier of a folder within one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderId(pub usize);

/// A node of the archive's folder tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: FolderId,
    pub display_name: String,
}

/// One message, addressed by its position in its folder's message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub folder: FolderId,
    pub index: usize,
}

/// One attachment, addressed by its position within a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    pub message: MessageRef,
    pub index: usize,
}

/// Container layout reported by [`Archive::format_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    /// A single mbox file.
    Mbox,
    /// A directory of mbox files and subfolders.
    MboxTree,
    /// A container assembled in memory.
    Memory,
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatType::Mbox => "mbox",
            FormatType::MboxTree => "mbox-tree",
            FormatType::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Encryption applied to the container's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encryption {
    None,
    /// A scheme the reader recognizes but cannot decode.
    Other(String),
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encryption::None => f.write_str("none"),
            Encryption::Other(name) => f.write_str(name),
        }
    }
}

/// Read access to a hierarchical message store.
///
/// The driver calls the classification methods in order
/// (`is_valid_signature`, `format_type`, `encryption_type`,
/// `initialize_index`) before asking for any folder. Implementations
/// guarantee the folder graph is a tree.
pub trait Archive {
    fn is_valid_signature(&mut self) -> Result<bool>;

    fn format_type(&mut self) -> Result<FormatType>;

    fn encryption_type(&mut self, format: FormatType) -> Result<Encryption>;

    /// Build whatever internal structures folder and message lookups need.
    /// Called exactly once per run.
    fn initialize_index(&mut self, format: FormatType) -> Result<()>;

    fn root_folder(&mut self) -> Result<Folder>;

    /// Direct children of `folder`, in the archive's own order.
    fn sub_folders(&mut self, folder: &Folder) -> Result<Vec<Folder>>;

    /// Messages held directly by `folder`, in the archive's own order.
    fn messages(&mut self, folder: &Folder) -> Result<Vec<MessageRef>>;

    /// Raw RFC 5322 header text. May be malformed.
    fn headers(&mut self, message: &MessageRef) -> Result<String>;

    fn plain_body(&mut self, message: &MessageRef) -> Result<String>;

    fn html_body(&mut self, message: &MessageRef) -> Result<String>;

    fn attachments(&mut self, message: &MessageRef) -> Result<Vec<AttachmentRef>>;

    fn attachment_long_filename(&mut self, attachment: &AttachmentRef) -> Result<String>;

    fn attachment_short_filename(&mut self, attachment: &AttachmentRef) -> Result<String>;

    /// The attachment's full content, materialized in memory.
    fn read_attachment(&mut self, attachment: &AttachmentRef) -> Result<Vec<u8>>;

    /// Release the archive. Called once at the end of a successful run.
    fn close(&mut self) -> Result<()>;
}
