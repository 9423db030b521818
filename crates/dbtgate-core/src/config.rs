//! Configuration schema (dbtgate.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::diagnostic::{DiagnosticCode, Severity};

/// Default location of the compiled manifest, relative to the project
pub const DEFAULT_MANIFEST_PATH: &str = "target/manifest.json";

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dbtgate.toml";

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to manifest.json (`-` reads stdin)
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// dbt project directory relative to the repository root
    #[serde(default)]
    pub project_dir: Option<String>,

    /// Regex of paths to leave out of every hook
    #[serde(default)]
    pub exclude: Option<String>,

    /// Follow schema.yml <-> model.sql companions when resolving paths
    #[serde(default = "default_true")]
    pub include_companions: bool,

    /// Where to write report.json, if anywhere
    #[serde(default)]
    pub report: Option<PathBuf>,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,
}

fn default_manifest() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_PATH)
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            project_dir: None,
            exclude: None,
            include_companions: true,
            report: None,
            severity: SeverityThreshold::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load the explicit config path, else `dbtgate.toml` if present, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
