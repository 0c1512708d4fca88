//! Run-wide export configuration.

use std::path::{Path, PathBuf};

use crate::config::{Config, DEFAULT_MAX_REPAIR_ATTEMPTS};

/// Which body representation an export should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyPreference {
    /// Use the HTML body when present, falling back to plain text.
    #[default]
    PreferHtml,
    /// Use the plain-text body only.
    PlaintextOnly,
}

/// Immutable configuration for one export run.
///
/// Built once at startup and only ever handed out by shared reference.
#[derive(Debug, Clone)]
pub struct ExportContext {
    input: PathBuf,
    output_dir: PathBuf,
    strategy: String,
    body: BodyPreference,
    max_repair_attempts: usize,
}

impl ExportContext {
    pub fn new(
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            strategy: strategy.into(),
            body: BodyPreference::default(),
            max_repair_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
        }
    }

    /// Seed a context from the configuration file defaults.
    pub fn from_config(config: &Config) -> Self {
        let body = if config.export.prefer_plaintext {
            BodyPreference::PlaintextOnly
        } else {
            BodyPreference::PreferHtml
        };
        Self::new(
            &config.export.default_input,
            &config.export.default_output_dir,
            &config.export.default_strategy,
        )
        .with_body_preference(body)
        .with_max_repair_attempts(config.export.max_header_repair_attempts)
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_body_preference(mut self, body: BodyPreference) -> Self {
        self.body = body;
        self
    }

    pub fn with_max_repair_attempts(mut self, attempts: usize) -> Self {
        self.max_repair_attempts = attempts;
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn body_preference(&self) -> BodyPreference {
        self.body
    }

    pub fn max_repair_attempts(&self) -> usize {
        self.max_repair_attempts
    }
}
