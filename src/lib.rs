//! `mailexport` — export every message of a hierarchical mail archive into
//! standalone `.eml` files, one per message, mirroring the folder tree.
//!
//! The pipeline reads through the [`archive::Archive`] contract, walks the
//! folder tree depth-first, and hands each message to a pluggable
//! [`export::ExportStrategy`]. Header blocks the strict parser rejects go
//! through a bounded repair loop before serialization.

pub mod archive;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod mime;
