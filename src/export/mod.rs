//! Export pipeline: strategies, the folder walk, and the run driver.
//!
//! A strategy turns one message into one artifact on disk. Strategies hold
//! no state between calls; everything they need arrives as arguments.

pub mod driver;
pub mod eml;
pub mod repair;
pub mod report;
pub mod walker;

use std::path::PathBuf;

use serde::Serialize;

use crate::archive::{Archive, Folder, MessageRef};
use crate::context::ExportContext;
use crate::error::{ExportError, Result};
use crate::mime::BodyType;

pub use driver::{execute_by_name, execute_strategy, run};
pub use eml::EmlStrategy;
pub use report::ExportReport;
pub use walker::FolderWalker;

/// What one successful export produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedMessage {
    pub path: PathBuf,
    pub body_type: BodyType,
    pub attachments_written: usize,
    pub attachments_skipped: usize,
    /// Size of the written file.
    pub bytes: u64,
}

/// Converts one message into one output artifact.
pub trait ExportStrategy {
    /// Registry name, as accepted by `--strategy`.
    fn name(&self) -> &'static str;

    /// Export `message`, the `index`-th message of `folder`.
    fn export(
        &self,
        archive: &mut dyn Archive,
        message: &MessageRef,
        index: usize,
        folder: &Folder,
        ctx: &ExportContext,
    ) -> Result<ExportedMessage>;
}

/// Every registered strategy, in listing order.
pub fn all_strategies() -> Vec<Box<dyn ExportStrategy>> {
    vec![Box::new(EmlStrategy)]
}

/// Look up a strategy by its registry name.
pub fn strategy_by_name(name: &str) -> Result<Box<dyn ExportStrategy>> {
    all_strategies()
        .into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| ExportError::StrategyNotFound(name.to_string()))
}
