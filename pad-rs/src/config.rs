//! Application configuration.
//!
//! Defaults live under `~/.pad`:
//!
//! | Setting | Default | Overrides |
//! |---------|---------|-----------|
//! | application dir | `~/.pad` | |
//! | standard library | `~/.pad/stdlib` | `stdlib = ...` in `~/.pad/config`, `PAD_STDLIB`, `--stdlib` |
//! | line encoding | `lf` | `line_encoding = crlf` in `~/.pad/config` |
//!
//! The config file holds `key = value` lines; blank lines and lines
//! starting with `#` are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;
use tracing::debug;

use crate::lang::LineEncoding;

/// Environment variable replacing the standard library directory.
pub const STDLIB_ENV: &str = "PAD_STDLIB";

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub std_lib_dir: PathBuf,
    pub app_dir: PathBuf,
    pub line_encoding: LineEncoding,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_app_dir(default_app_dir())
    }
}

impl Config {
    /// Defaults rooted at `app_dir` instead of `~/.pad`.
    pub fn with_app_dir(app_dir: impl Into<PathBuf>) -> Self {
        let app_dir = app_dir.into();
        Config { std_lib_dir: app_dir.join("stdlib"), app_dir, line_encoding: LineEncoding::Lf }
    }

    /// Defaults, then `~/.pad/config`, then the environment.
    pub fn load() -> (Self, Vec<ConfigError>) {
        let mut config = Config::default();
        let errors = match fs::read_to_string(config.config_file()) {
            Ok(s) => config.apply_str(&s),
            Err(_) => Vec::new(),
        };
        if let Some(dir) = std::env::var_os(STDLIB_ENV) {
            config.std_lib_dir = PathBuf::from(dir);
        }
        debug!(std_lib_dir = %config.std_lib_dir.display(), "config loaded");
        (config, errors)
    }

    pub fn config_file(&self) -> PathBuf {
        self.app_dir.join("config")
    }

    /// Apply `key = value` lines, collecting errors for bad lines instead of
    /// stopping at the first one.
    pub fn apply_str(&mut self, s: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError { line: lineno, message: format!("expected key = value, got \"{line}\"") });
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "stdlib" => self.std_lib_dir = expand_home(value),
                "line_encoding" => match value.parse() {
                    Ok(enc) => self.line_encoding = enc,
                    Err(message) => errors.push(ConfigError { line: lineno, message }),
                },
                other => errors.push(ConfigError { line: lineno, message: format!("unknown key \"{other}\"") }),
            }
        }
        errors
    }

    /// Create the application directory if it does not exist yet.
    pub fn deploy_env(&self) -> std::io::Result<()> {
        if !self.app_dir.is_dir() {
            debug!(dir = %self.app_dir.display(), "creating application directory");
            fs::create_dir_all(&self.app_dir)?;
        }
        Ok(())
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn default_app_dir() -> PathBuf {
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".pad"),
        None => PathBuf::from(".pad"),
    }
}

/// `~/x` → `<home>/x`.
fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), BaseDirs::new()) {
        (Some(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => Path::new(value).to_path_buf(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
