//! Depth-first traversal of the archive's folder tree.

use tracing::{error, info, info_span};

use crate::archive::{Archive, Folder};
use crate::context::ExportContext;
use crate::error::Result;
use crate::export::{ExportReport, ExportStrategy};

/// Hands every message below a root folder to one strategy, pre-order.
///
/// The root's own messages are not exported; an archive root is a container,
/// not a mailbox. A failed message is logged and skipped. A failed folder or
/// message enumeration aborts the walk.
pub struct FolderWalker<'a> {
    strategy: &'a dyn ExportStrategy,
    ctx: &'a ExportContext,
    progress: &'a dyn Fn(&ExportReport),
}

impl<'a> FolderWalker<'a> {
    pub fn new(
        strategy: &'a dyn ExportStrategy,
        ctx: &'a ExportContext,
        progress: &'a dyn Fn(&ExportReport),
    ) -> Self {
        Self {
            strategy,
            ctx,
            progress,
        }
    }

    /// Walk every folder below `root`, recording results into `report`.
    pub fn walk(
        &self,
        archive: &mut dyn Archive,
        root: &Folder,
        report: &mut ExportReport,
    ) -> Result<()> {
        for folder in archive.sub_folders(root)? {
            self.export_folder(archive, &folder, report)?;
            self.walk(archive, &folder, report)?;
        }
        Ok(())
    }

    fn export_folder(
        &self,
        archive: &mut dyn Archive,
        folder: &Folder,
        report: &mut ExportReport,
    ) -> Result<()> {
        let span = info_span!("folder", name = %folder.display_name);
        let _enter = span.enter();

        report.record_folder();
        let messages = archive.messages(folder)?;
        info!(count = messages.len(), "Processing folder");

        for (index, message) in messages.iter().enumerate() {
            match self
                .strategy
                .export(archive, message, index, folder, self.ctx)
            {
                Ok(exported) => report.record_exported(&exported),
                Err(e) => {
                    error!(index, error = %e, "Failed to export message (skipping)");
                    report.record_failed();
                }
            }
            (self.progress)(report);
        }
        Ok(())
    }
}
