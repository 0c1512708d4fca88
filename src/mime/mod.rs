//! Mail serialization: strict header parsing and `multipart/mixed` output.

pub mod header;
pub mod writer;

pub use header::{Charset, HeaderField, HeaderSet};
pub use writer::{AttachmentHeader, BodyType, MailWriter};
