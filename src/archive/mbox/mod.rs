//! Archive reader for mbox files and Thunderbird-style mbox trees.
//!
//! The input is either a single mbox file or a directory:
//!
//! ```text
//! Mail/                 root folder
//! ├── Inbox             folder "Inbox" (mbox file)
//! ├── Inbox.msf         ignored (not an mbox)
//! ├── Inbox.sbd/        children of "Inbox"
//! │   └── Projects      folder "Projects"
//! ├── Sent.mbox         folder "Sent"
//! └── Old/              folder "Old" without messages
//!     └── 2019.mbox     folder "2019"
//! ```
//!
//! A single file input becomes a root folder with one child named after the
//! file stem. Folders appear in name order, followed by any `.sbd` directory
//! that has no sibling mbox. Symbolic links are not followed, so the folder
//! graph is always a tree.

mod message;
pub mod scanner;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::{
    Archive, AttachmentRef, Encryption, Folder, FolderId, FormatType, MessageRef,
};
use crate::config::ArchiveConfig;
use crate::error::{ExportError, Result};

use self::message::{AttachmentPart, MessageParts};
use self::scanner::{MboxScanner, MessageSpan};

/// Reader tuning knobs.
#[derive(Debug, Clone)]
pub struct MboxOptions {
    /// Read buffer size used while scanning.
    pub read_buffer_size: usize,
    /// Messages larger than this are refused.
    pub max_message_size: usize,
}

impl Default for MboxOptions {
    fn default() -> Self {
        ArchiveConfig::default().into()
    }
}

impl From<ArchiveConfig> for MboxOptions {
    fn from(config: ArchiveConfig) -> Self {
        Self {
            read_buffer_size: config.read_buffer_size,
            max_message_size: config.max_message_size,
        }
    }
}

#[derive(Debug)]
struct FolderNode {
    display_name: String,
    mbox: Option<PathBuf>,
    children: Vec<FolderId>,
    spans: Vec<MessageSpan>,
}

/// An mbox file or directory of mbox files, read as an [`Archive`].
pub struct MboxArchive {
    path: PathBuf,
    options: MboxOptions,
    folders: Vec<FolderNode>,
    cached: Option<(MessageRef, MessageParts)>,
    #[cfg(test)]
    extractions: usize,
}

impl MboxArchive {
    /// Open an archive. Only checks that the path exists; call the
    /// [`Archive`] classification methods before reading folders.
    pub fn open(path: impl AsRef<Path>, options: MboxOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExportError::FileNotFound(path.clone())
            } else {
                ExportError::io(&path, e)
            }
        })?;
        Ok(Self {
            path,
            options,
            folders: Vec::new(),
            cached: None,
            #[cfg(test)]
            extractions: 0,
        })
    }

    fn node(&self, id: FolderId) -> Result<&FolderNode> {
        self.folders.get(id.0).ok_or(ExportError::FolderNotFound(id.0))
    }

    fn add_folder(
        &mut self,
        parent: Option<FolderId>,
        display_name: String,
        mbox: Option<PathBuf>,
    ) -> Result<FolderId> {
        let spans = match &mbox {
            Some(path) => {
                let spans = MboxScanner::new(path, self.options.read_buffer_size)?.scan()?;
                info!(folder = %display_name, messages = spans.len(), "Indexed mbox");
                spans
            }
            None => Vec::new(),
        };
        let id = FolderId(self.folders.len());
        self.folders.push(FolderNode {
            display_name,
            mbox,
            children: Vec::new(),
            spans,
        });
        if let Some(parent) = parent {
            self.folders[parent.0].children.push(id);
        }
        Ok(id)
    }

    /// Add every folder found in `dir` as a child of `parent`, recursively.
    fn discover(&mut self, parent: FolderId, dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(dir)
            .map_err(|e| ExportError::io(dir, e))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| ExportError::io(dir, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut pending: Vec<(String, Option<PathBuf>, Option<PathBuf>)> = Vec::new();
        let mut subdirs: Vec<(String, PathBuf)> = Vec::new();

        for entry in &entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().map_err(|e| ExportError::io(&path, e))?;

            if file_type.is_dir() {
                match name.strip_suffix(".sbd") {
                    Some(stem) => subdirs.push((stem.to_string(), path)),
                    None => pending.push((name, None, Some(path))),
                }
            } else if file_type.is_file() {
                if scanner::has_mbox_signature(&path)? {
                    pending.push((folder_name_for_file(&name), Some(path), None));
                } else {
                    debug!(path = %path.display(), "Skipping non-mbox file");
                }
            }
        }

        // Attach each `.sbd` directory to the mbox file sharing its stem
        for (stem, sbd) in subdirs {
            let sibling = pending.iter_mut().find(|(name, mbox, children)| {
                *name == stem && mbox.is_some() && children.is_none()
            });
            match sibling {
                Some(slot) => slot.2 = Some(sbd),
                None => pending.push((stem, None, Some(sbd))),
            }
        }

        for (name, mbox, children) in pending {
            let id = self.add_folder(Some(parent), name, mbox)?;
            if let Some(children) = children {
                self.discover(id, &children)?;
            }
        }
        Ok(())
    }

    fn read_message(&self, message: &MessageRef) -> Result<Vec<u8>> {
        let not_found = ExportError::MessageNotFound {
            folder: message.folder.0,
            index: message.index,
        };
        let node = self.node(message.folder)?;
        let (Some(path), Some(span)) = (&node.mbox, node.spans.get(message.index)) else {
            return Err(not_found);
        };
        if span.length > self.options.max_message_size as u64 {
            return Err(ExportError::MessageTooLarge {
                offset: span.offset,
                length: span.length,
                limit: self.options.max_message_size,
            });
        }
        let raw = scanner::read_span(path, *span)?;
        Ok(message::strip_from_line(&raw).to_vec())
    }

    /// Parts of `message`, parsed once and kept until another message is requested.
    fn load(&mut self, message: &MessageRef) -> Result<&MessageParts> {
        let hit = matches!(&self.cached, Some((cached, _)) if cached == message);
        if !hit {
            let raw = self.read_message(message)?;
            let parts = MessageParts::extract(&raw);
            #[cfg(test)]
            {
                self.extractions += 1;
            }
            self.cached = Some((*message, parts));
        }
        match &self.cached {
            Some((_, parts)) => Ok(parts),
            None => Err(ExportError::MessageNotFound {
                folder: message.folder.0,
                index: message.index,
            }),
        }
    }

    fn attachment_part(&mut self, attachment: &AttachmentRef) -> Result<&AttachmentPart> {
        self.load(&attachment.message)?
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

impl Archive for MboxArchive {
    fn is_valid_signature(&mut self) -> Result<bool> {
        if self.path.is_dir() {
            fs::read_dir(&self.path).map_err(|e| ExportError::io(&self.path, e))?;
            return Ok(true);
        }
        scanner::has_mbox_signature(&self.path)
    }

    fn format_type(&mut self) -> Result<FormatType> {
        if self.path.is_dir() {
            Ok(FormatType::MboxTree)
        } else {
            Ok(FormatType::Mbox)
        }
    }

    fn encryption_type(&mut self, _format: FormatType) -> Result<Encryption> {
        Ok(Encryption::None)
    }

    fn initialize_index(&mut self, format: FormatType) -> Result<()> {
        self.folders.clear();
        self.cached = None;

        let root_name = display_name_of(&self.path);
        let root = self.add_folder(None, root_name, None)?;
        match format {
            FormatType::Mbox => {
                let name = self
                    .path
                    .file_name()
                    .map(|n| folder_name_for_file(&n.to_string_lossy()))
                    .unwrap_or_else(|| "mbox".to_string());
                self.add_folder(Some(root), name, Some(self.path.clone()))?;
            }
            FormatType::MboxTree => {
                let path = self.path.clone();
                self.discover(root, &path)?;
            }
            FormatType::Memory => {
                return Err(ExportError::Archive(format!(
                    "cannot index a {format} archive from {}",
                    self.path.display()
                )));
            }
        }
        info!(folders = self.folders.len(), "Archive index ready");
        Ok(())
    }

    fn root_folder(&mut self) -> Result<Folder> {
        if self.folders.is_empty() {
            return Err(ExportError::Archive("index not initialized".into()));
        }
        self.folder_handle(FolderId(0))
    }

    fn sub_folders(&mut self, folder: &Folder) -> Result<Vec<Folder>> {
        self.node(folder.id)?
            .children
            .iter()
            .map(|&id| self.folder_handle(id))
            .collect()
    }

    fn messages(&mut self, folder: &Folder) -> Result<Vec<MessageRef>> {
        let count = self.node(folder.id)?.spans.len();
        Ok((0..count)
            .map(|index| MessageRef {
                folder: folder.id,
                index,
            })
            .collect())
    }

    fn headers(&mut self, message: &MessageRef) -> Result<String> {
        Ok(self.load(message)?.headers.clone())
    }

    fn plain_body(&mut self, message: &MessageRef) -> Result<String> {
        self.load(message)?
            .plain
            .clone()
            .ok_or(ExportError::BodyUnavailable("plain-text"))
    }

    fn html_body(&mut self, message: &MessageRef) -> Result<String> {
        self.load(message)?
            .html
            .clone()
            .ok_or(ExportError::BodyUnavailable("HTML"))
    }

    fn attachments(&mut self, message: &MessageRef) -> Result<Vec<AttachmentRef>> {
        let count = self.load(message)?.attachments.len();
        Ok((0..count)
            .map(|index| AttachmentRef {
                message: *message,
                index,
            })
            .collect())
    }

    fn attachment_long_filename(&mut self, attachment: &AttachmentRef) -> Result<String> {
        self.attachment_part(attachment)?
            .long_name
            .clone()
            .ok_or(ExportError::AttachmentNameUnavailable)
    }

    fn attachment_short_filename(&mut self, attachment: &AttachmentRef) -> Result<String> {
        self.attachment_part(attachment)?
            .short_name
            .clone()
            .ok_or(ExportError::AttachmentNameUnavailable)
    }

    fn read_attachment(&mut self, attachment: &AttachmentRef) -> Result<Vec<u8>> {
        Ok(self.attachment_part(attachment)?.contents.clone())
    }

    fn close(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), "Closing archive");
        self.cached = None;
        self.folders.clear();
        Ok(())
    }
}

/// Folder name for an mbox file: the file name without a `.mbox`/`.mbx` extension.
fn folder_name_for_file(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    for ext in [".mbox", ".mbx"] {
        if lower.ends_with(ext) && file_name.len() > ext.len() {
            return file_name[..file_name.len() - ext.len()].to_string();
        }
    }
    file_name.to_string()
}

fn display_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
