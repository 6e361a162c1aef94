//! Analyzer configuration, loaded from YAML with blanket defaults. Detector
//! tables and the canonical quote pair are compile-time constants, not
//! config.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Tunable knobs for analysis and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-section sample issue list bound.
    pub sample_issues_cap: usize,
    /// Before/after line pair bound in change reports.
    pub detailed_changes_cap: usize,
    /// Rule codes dropped from analysis output entirely.
    pub disabled_codes: Vec<String>,
    /// Globs excluded from directory scans by the CLI.
    pub ignore_globs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_issues_cap: 10,
            detailed_changes_cap: 20,
            disabled_codes: Vec::new(),
            ignore_globs: vec![
                "**/.git/**".into(),
                "**/node_modules/**".into(),
                "**/target/**".into(),
            ],
        }
    }
}

impl Config {
    /// Load from a YAML file. A missing file yields the defaults; unreadable
    /// or malformed content is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}
