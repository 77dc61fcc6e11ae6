//! TOML configuration.
//!
//! `./.bookdup.toml` is layered over `<config_dir>/bookdup/config.toml`;
//! command-line arguments override both.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::{ScanParams, Strategy, TargetParams};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// On-disk configuration. All fields are optional so partial files work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub library: Option<LibraryConfig>,
    pub scan: Option<ScanConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub strategy: Option<Strategy>,
    pub threshold: Option<f64>,
    pub max_groups: Option<usize>,
    pub same_author: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: Option<String>,
    pub show_groups: Option<usize>,
}

impl ConfigFile {
    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_ref()?.path.as_deref()
    }

    fn scan_config(&self) -> ScanConfig {
        self.scan.clone().unwrap_or_default()
    }

    /// Scan parameters from the config, falling back to library defaults.
    pub fn scan_params(&self) -> ScanParams {
        let defaults = ScanParams::default();
        let scan = self.scan_config();
        ScanParams {
            strategy: scan.strategy.unwrap_or(defaults.strategy),
            threshold: scan.threshold.unwrap_or(defaults.threshold),
            max_groups: scan.max_groups.unwrap_or(defaults.max_groups),
        }
    }

    /// Targeted-mode parameters from the config, falling back to defaults.
    pub fn target_params(&self) -> TargetParams {
        let defaults = TargetParams::default();
        let scan = self.scan_config();
        TargetParams {
            strategy: scan.strategy.unwrap_or(defaults.strategy),
            threshold: scan.threshold.unwrap_or(defaults.threshold),
            same_author: scan.same_author.unwrap_or(defaults.same_author),
        }
    }
}

/// Platform config path: `<config_dir>/bookdup/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bookdup").join("config.toml"))
}

/// Load config by cascading CWD `.bookdup.toml` over the platform config.
/// Missing or unreadable files are skipped.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_optional(&p));
    let cwd = load_optional(Path::new(".bookdup.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

fn load_optional(path: &Path) -> Option<ConfigFile> {
    if !path.is_file() {
        return None;
    }
    match load_from_path(path) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("ignoring config: {}", e);
            None
        }
    }
}

/// Load a config from an explicit path. The file must exist and parse.
pub fn load_from_path(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_config(content: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let library = match (base.library, overlay.library) {
        (None, None) => None,
        (b, o) => {
            let (b, o) = (b.unwrap_or_default(), o.unwrap_or_default());
            Some(LibraryConfig {
                path: o.path.or(b.path),
            })
        }
    };

    let scan = match (base.scan, overlay.scan) {
        (None, None) => None,
        (b, o) => {
            let (b, o) = (b.unwrap_or_default(), o.unwrap_or_default());
            Some(ScanConfig {
                strategy: o.strategy.or(b.strategy),
                threshold: o.threshold.or(b.threshold),
                max_groups: o.max_groups.or(b.max_groups),
                same_author: o.same_author.or(b.same_author),
            })
        }
    };

    let output = match (base.output, overlay.output) {
        (None, None) => None,
        (b, o) => {
            let (b, o) = (b.unwrap_or_default(), o.unwrap_or_default());
            Some(OutputConfig {
                format: o.format.or(b.format),
                show_groups: o.show_groups.or(b.show_groups),
            })
        }
    };

    ConfigFile {
        library,
        scan,
        output,
    }
}
