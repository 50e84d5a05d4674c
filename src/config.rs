//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$LUREFILL_CONFIG` (environment variable)
//! 2. `~/.config/lurefill/config.toml` (Linux/macOS)
//!    `%APPDATA%\lurefill\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::format::{ARCHIVE_EXTENSIONS, MEMBER_EXTENSIONS, TEXT_EXTENSIONS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Extension table used for dispatch.
    pub formats: FormatsConfig,
    /// Multi-recipient rendering.
    pub batch: BatchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Extension table used for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatsConfig {
    /// Match extensions regardless of case (`.DOCX` == `.docx`).
    pub case_insensitive: bool,
    /// Zip-based office formats whose XML members are templated.
    pub archive_extensions: Vec<String>,
    /// Formats rendered as a single text template.
    pub text_extensions: Vec<String>,
    /// Archive member extensions eligible for templating.
    pub member_extensions: Vec<String>,
}

/// Multi-recipient rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads (0 = available parallelism).
    pub jobs: usize,
    /// Base URL used when none is given on the command line.
    pub base_url: String,
    /// Sender display name used when none is given on the command line.
    pub from: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for FormatsConfig {
    fn default() -> Self {
        let owned = |exts: &[&str]| -> Vec<String> { exts.iter().map(|e| e.to_string()).collect() };
        Self {
            case_insensitive: true,
            archive_extensions: owned(ARCHIVE_EXTENSIONS),
            text_extensions: owned(TEXT_EXTENSIONS),
            member_extensions: owned(MEMBER_EXTENSIONS),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            base_url: "http://localhost".to_string(),
            from: String::new(),
        }
    }
}

impl BatchConfig {
    /// Resolve `jobs`, substituting the machine's parallelism for 0.
    pub fn worker_count(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from an explicit path, falling back to defaults on error.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("LUREFILL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("lurefill").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lurefill")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("lurefill.log")
}
