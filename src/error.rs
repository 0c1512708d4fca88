//! Centralized error types for mailexport.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailexport library.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified archive does not exist.
    #[error("Archive not found: {0}")]
    FileNotFound(PathBuf),

    /// The archive failed its signature check.
    #[error("Invalid input file signature: {0}")]
    InvalidSignature(PathBuf),

    /// The archive is encrypted with a scheme we cannot read.
    #[error("Unsupported archive encryption: {0}")]
    UnsupportedEncryption(String),

    /// A folder handle does not resolve inside the archive.
    #[error("Folder not found: {0}")]
    FolderNotFound(usize),

    /// A message handle does not resolve inside its folder.
    #[error("Message {index} not found in folder {folder}")]
    MessageNotFound { folder: usize, index: usize },

    /// An attachment handle does not resolve inside its message.
    #[error("Attachment {0} not found")]
    AttachmentNotFound(usize),

    /// The message is larger than the configured limit.
    #[error("Message at offset {offset} is {length} bytes, limit is {limit}")]
    MessageTooLarge { offset: u64, length: u64, limit: usize },

    /// The requested body representation does not exist for this message.
    #[error("No {0} body available")]
    BodyUnavailable(&'static str),

    /// Neither the long nor the short attachment filename could be resolved.
    #[error("Attachment has no recoverable name")]
    AttachmentNameUnavailable,

    /// The raw header text could not be parsed or repaired.
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    /// No export strategy is registered under this name.
    #[error("Export strategy not found: {0}")]
    StrategyNotFound(String),

    /// The configuration file exists but is not valid TOML for [`Config`].
    ///
    /// [`Config`]: crate::config::Config
    #[error("Invalid config file '{path}': {message}")]
    Config { path: PathBuf, message: String },

    /// The archive could not be read for a reason specific to its format.
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Failure to parse a raw header block.
///
/// Variants compare structurally so the repair loop can tell whether a
/// rewrite changed the outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// A field name contains bytes outside the RFC 7230 token set.
    #[error("malformed header key: {0}")]
    MalformedKey(String),

    /// A field value (named by its field) carries NUL or U+FFFD.
    #[error("malformed header value in field: {0}")]
    MalformedValue(String),

    /// A line is neither a field nor a continuation.
    #[error("malformed header line: {0}")]
    MalformedLine(String),

    /// The block starts with a continuation line.
    #[error("malformed header initial line: {0}")]
    MalformedInitialLine(String),

    /// Repair ran out of attempts.
    #[error("unrecoverable header: repair attempts exhausted")]
    Unrecoverable,
}

/// Convenience alias for `Result<T, ExportError>`.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare; prefer `ExportError::io`).
impl From<std::io::Error> for ExportError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
