//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILEXPORT_CONFIG` (environment variable)
//! 2. `~/.config/mailexport/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailexport\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags take precedence over every value loaded here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Archive read when `--input` is not given.
pub const DEFAULT_INPUT: &str = "data/enron.pst";

/// Output root used when `--output` is not given.
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// Strategy used when `--strategy` is not given.
pub const DEFAULT_STRATEGY: &str = "eml";

/// Default bound on header repair attempts.
pub const DEFAULT_MAX_REPAIR_ATTEMPTS: usize = 10;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Export defaults.
    pub export: ExportConfig,
    /// Archive reader tuning.
    pub archive: ArchiveConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Also write logs to `mailexport.log` in the cache directory.
    pub log_to_file: bool,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Archive to read.
    pub default_input: PathBuf,
    /// Root directory for exported files.
    pub default_output_dir: PathBuf,
    /// Strategy name, see `--strategies`.
    pub default_strategy: String,
    /// Export only the plain-text body, never HTML.
    pub prefer_plaintext: bool,
    /// Upper bound on line-removal attempts when repairing headers.
    pub max_header_repair_attempts: usize,
}

/// Archive reader tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Read buffer size in bytes (default: 1048576 = 1 MB).
    pub read_buffer_size: usize,
    /// Maximum message size in bytes (default: 268435456 = 256 MB).
    pub max_message_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_dir: None,
            log_to_file: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_input: PathBuf::from(DEFAULT_INPUT),
            default_output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            default_strategy: DEFAULT_STRATEGY.to_string(),
            prefer_plaintext: false,
            max_header_repair_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024 * 1024,       // 1 MB
            max_message_size: 256 * 1024 * 1024, // 256 MB
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load the config file, if there is one.
///
/// `Ok(None)` means no file exists and built-in defaults apply. An unreadable
/// or invalid file is an error; the caller decides whether to fall back.
pub fn load_config() -> Result<Option<Config>> {
    match config_file_path() {
        Some(path) if path.exists() => read_config(&path).map(Some),
        _ => Ok(None),
    }
}

/// Parse the config file at `path`.
pub fn read_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
    toml::from_str(&contents).map_err(|e| ExportError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILEXPORT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailexport").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailexport")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.export.default_input, PathBuf::from("data/enron.pst"));
        assert_eq!(cfg.export.default_output_dir, PathBuf::from("data"));
        assert_eq!(cfg.export.default_strategy, "eml");
        assert!(!cfg.export.prefer_plaintext);
        assert_eq!(cfg.export.max_header_repair_attempts, 10);
        assert_eq!(cfg.archive.max_message_size, 256 * 1024 * 1024);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.export.default_strategy, cfg.export.default_strategy);
        assert_eq!(
            parsed.archive.read_buffer_size,
            cfg.archive.read_buffer_size
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[export]
prefer_plaintext = true
max_header_repair_attempts = 3
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(cfg.export.prefer_plaintext);
        assert_eq!(cfg.export.max_header_repair_attempts, 3);
        // Other fields use defaults
        assert_eq!(cfg.export.default_strategy, "eml");
        assert_eq!(cfg.general.log_level, "info");
        assert!(cfg.general.log_to_file);
    }

    #[test]
    fn test_cache_dir_override() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/mailexport-logs"));
        assert_eq!(cache_dir(&cfg), PathBuf::from("/tmp/mailexport-logs"));
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[export]\ndefault_strategy = \"eml\"\nprefer_plaintext = true\n")
            .unwrap();
        let cfg = read_config(&path).unwrap();
        assert!(cfg.export.prefer_plaintext);
    }

    #[test]
    fn test_read_invalid_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[export\nprefer_plaintext = maybe\n").unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(matches!(err, ExportError::Config { path: ref p, .. } if p == &path));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_read_missing_config_is_io_error() {
        let err = read_config(Path::new("/nonexistent/mailexport.toml")).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
