//! Run statistics.

use serde::Serialize;

use crate::export::ExportedMessage;

/// Counters for one export run, updated as the walk proceeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Folders visited below the root.
    pub folders: usize,
    pub messages_exported: usize,
    pub messages_failed: usize,
    pub attachments_written: usize,
    pub attachments_skipped: usize,
    /// Total size of the written `.eml` files.
    pub bytes_written: u64,
}

impl ExportReport {
    pub fn record_folder(&mut self) {
        self.folders += 1;
    }

    pub fn record_exported(&mut self, message: &ExportedMessage) {
        self.messages_exported += 1;
        self.attachments_written += message.attachments_written;
        self.attachments_skipped += message.attachments_skipped;
        self.bytes_written += message.bytes;
    }

    pub fn record_failed(&mut self) {
        self.messages_failed += 1;
    }

    /// Messages the walk has handed to the strategy so far.
    pub fn messages_seen(&self) -> usize {
        self.messages_exported + self.messages_failed
    }
}
