//! Pipeline driver: classify and index the archive, walk it, close it.

use tracing::{info, info_span};

use crate::archive::mbox::{MboxArchive, MboxOptions};
use crate::archive::{Archive, Encryption};
use crate::context::ExportContext;
use crate::error::{ExportError, Result};
use crate::export::{strategy_by_name, ExportReport, ExportStrategy, FolderWalker};

/// Run `strategy` over every folder of an already opened archive.
///
/// Any classification, indexing, enumeration or close failure aborts the
/// run. Per-message failures only show up in the returned report.
pub fn run(
    archive: &mut dyn Archive,
    strategy: &dyn ExportStrategy,
    ctx: &ExportContext,
    progress: &dyn Fn(&ExportReport),
) -> Result<ExportReport> {
    let span = info_span!(
        "export",
        strategy = strategy.name(),
        input = %ctx.input().display()
    );
    let _enter = span.enter();
    info!("Executing export strategy");

    if !archive.is_valid_signature()? {
        return Err(ExportError::InvalidSignature(ctx.input().to_path_buf()));
    }
    let format = archive.format_type()?;
    let encryption = archive.encryption_type(format)?;
    if let Encryption::Other(name) = encryption {
        return Err(ExportError::UnsupportedEncryption(name));
    }

    info!(%format, "Initializing index");
    archive.initialize_index(format)?;
    let root = archive.root_folder()?;

    let mut report = ExportReport::default();
    FolderWalker::new(strategy, ctx, progress).walk(archive, &root, &mut report)?;
    archive.close()?;

    info!(
        folders = report.folders,
        exported = report.messages_exported,
        failed = report.messages_failed,
        "Export finished"
    );
    Ok(report)
}

/// Open the input named by `ctx` and run `strategy` over it.
pub fn execute_strategy(
    strategy: &dyn ExportStrategy,
    ctx: &ExportContext,
    options: MboxOptions,
    progress: &dyn Fn(&ExportReport),
) -> Result<ExportReport> {
    let mut archive = MboxArchive::open(ctx.input(), options)?;
    run(&mut archive, strategy, ctx, progress)
}

/// Resolve the strategy named by `ctx`, then execute it.
///
/// The lookup happens first; an unknown name never opens the archive.
pub fn execute_by_name(
    ctx: &ExportContext,
    options: MboxOptions,
    progress: &dyn Fn(&ExportReport),
) -> Result<ExportReport> {
    let strategy = strategy_by_name(ctx.strategy())?;
    execute_strategy(strategy.as_ref(), ctx, options, progress)
}
